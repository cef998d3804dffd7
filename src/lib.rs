//! oasgate validates in-flight HTTP traffic against an OpenAPI 3.0.x or
//! 3.1.x contract.
//!
//! Given a parsed specification and a request/response pair, the validator
//! decides whether the exchange conforms and, when it does not, returns
//! structured validation errors carrying the spec line/column, an RFC 6901
//! keyword location and a JSONPath instance location, so gateways and
//! developer tooling can point at the exact offending node.

pub mod cache;
pub mod codec;
pub mod converter;
pub mod error;
pub mod locator;
pub mod router;
pub mod schema;
pub mod traverser;
pub mod types;
pub mod validator;

pub use error::{ValidationError, ValidationReport, ValidationSubType, ValidationType};
pub use validator::builder::OpenApiValidatorBuilder;
pub use validator::OpenApiValidator;

pub(crate) const OPENAPI_FIELD: &str = "openapi";
pub(crate) const PATHS_FIELD: &str = "paths";
pub(crate) const REF_FIELD: &str = "$ref";
pub(crate) const NAME_FIELD: &str = "name";
pub(crate) const IN_FIELD: &str = "in";
pub(crate) const REQUIRED_FIELD: &str = "required";
pub(crate) const SCHEMA_FIELD: &str = "schema";
pub(crate) const CONTENT_FIELD: &str = "content";
pub(crate) const STYLE_FIELD: &str = "style";
pub(crate) const EXPLODE_FIELD: &str = "explode";
pub(crate) const ALLOW_RESERVED_FIELD: &str = "allowReserved";
pub(crate) const PARAMETERS_FIELD: &str = "parameters";
pub(crate) const REQUEST_BODY_FIELD: &str = "requestBody";
pub(crate) const RESPONSES_FIELD: &str = "responses";
pub(crate) const HEADERS_FIELD: &str = "headers";
pub(crate) const ENCODING_FIELD: &str = "encoding";
pub(crate) const TYPE_FIELD: &str = "type";
pub(crate) const ENUM_FIELD: &str = "enum";
pub(crate) const ITEMS_FIELD: &str = "items";
pub(crate) const PROPERTIES_FIELD: &str = "properties";
pub(crate) const ADDITIONAL_PROPERTIES_FIELD: &str = "additionalProperties";
pub(crate) const NULLABLE_FIELD: &str = "nullable";
pub(crate) const XML_FIELD: &str = "xml";

pub(crate) const PATH_SEPARATOR: &str = "/";
pub(crate) const TILDE: &str = "~";
pub(crate) const ENCODED_TILDE: &str = "~0";
pub(crate) const ENCODED_SLASH: &str = "~1";
