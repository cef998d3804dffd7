use crate::types::json_path::jsonpath_from_segments;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, LazyLock};

/// Coarse classification of a validation failure, mirrored in the serialized
/// error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationType {
    Parameter,
    Request,
    Response,
    Path,
    Schema,
    Xml,
    Urlencoded,
    Strict,
    Internal,
}

impl Display for ValidationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidationType::Parameter => "parameter",
            ValidationType::Request => "request",
            ValidationType::Response => "response",
            ValidationType::Path => "path",
            ValidationType::Schema => "schema",
            ValidationType::Xml => "xml",
            ValidationType::Urlencoded => "urlencoded",
            ValidationType::Strict => "strict",
            ValidationType::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationSubType {
    Query,
    Path,
    Header,
    Cookie,
    Body,
    ContentType,
    Missing,
    MissingOperation,
    ResponseCode,
    Prefix,
    Namespace,
    Schema,
    InvalidTypeEncoding,
    ReservedValues,
    Property,
    Aborted,
}

impl Display for ValidationSubType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidationSubType::Query => "query",
            ValidationSubType::Path => "path",
            ValidationSubType::Header => "header",
            ValidationSubType::Cookie => "cookie",
            ValidationSubType::Body => "body",
            ValidationSubType::ContentType => "contentType",
            ValidationSubType::Missing => "missing",
            ValidationSubType::MissingOperation => "missingOperation",
            ValidationSubType::ResponseCode => "responseCode",
            ValidationSubType::Prefix => "prefix",
            ValidationSubType::Namespace => "namespace",
            ValidationSubType::Schema => "schema",
            ValidationSubType::InvalidTypeEncoding => "invalidTypeEncoding",
            ValidationSubType::ReservedValues => "reservedValues",
            ValidationSubType::Property => "property",
            ValidationSubType::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// One JSON Schema keyword failure reported by the engine, re-anchored into
/// the specification document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaValidationFailure {
    pub reason: String,
    /// Raw instance-location segments, as reported by the engine.
    pub instance_path: Vec<String>,
    /// Last instance segment, or empty at the instance root.
    pub field_name: String,
    /// JSONPath rendering of the instance location.
    pub field_path: String,
    /// RFC 6901 pointer into the spec naming the failing keyword.
    pub keyword_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_object: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl SchemaValidationFailure {
    pub fn new(reason: impl Into<String>, instance_segments: Vec<String>, keyword_location: String) -> Self {
        let field_name = instance_segments.last().cloned().unwrap_or_default();
        let field_path = jsonpath_from_segments(instance_segments.iter());
        Self {
            reason: reason.into(),
            instance_path: instance_segments,
            field_name,
            field_path,
            keyword_location,
            reference_schema: None,
            reference_object: None,
            line: 0,
            column: 0,
        }
    }

    pub fn with_rendered(mut self, schema: Option<&Value>, instance: Option<&Value>) -> Self {
        self.reference_schema = schema.map(render_pretty);
        self.reference_object = instance.map(render_pretty);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

fn render_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// A single contract violation, located both in the request instance and in
/// the specification source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub message: String,
    pub reason: String,
    pub validation_type: ValidationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_sub_type: Option<ValidationSubType>,
    pub spec_line: u32,
    pub spec_col: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub how_to_fix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub spec_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
    /// RFC 6901 pointer into the spec naming the violated keyword.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_location: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schema_validation_errors: Vec<SchemaValidationFailure>,
    /// The offending spec node, for programmatic consumers. Not serialized.
    #[serde(skip_serializing)]
    pub context: Option<Arc<Value>>,
}

impl ValidationError {
    pub fn new(
        validation_type: ValidationType,
        sub_type: ValidationSubType,
        message: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            reason: reason.into(),
            validation_type,
            validation_sub_type: Some(sub_type),
            spec_line: 0,
            spec_col: 0,
            how_to_fix: String::new(),
            request_path: String::new(),
            request_method: String::new(),
            spec_path: String::new(),
            parameter_name: None,
            keyword_location: None,
            schema_validation_errors: Vec::new(),
            context: None,
        }
    }

    /// An internal fault (malformed spec, cache corruption). Carries enough
    /// context to locate the spec node but no sub-type.
    pub fn internal(message: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut err = Self::new(
            ValidationType::Internal,
            ValidationSubType::Schema,
            message,
            reason,
        );
        err.validation_sub_type = None;
        err
    }

    pub fn aborted() -> Self {
        Self::new(
            ValidationType::Internal,
            ValidationSubType::Aborted,
            "Validation aborted",
            "The validation run was cancelled before it completed",
        )
    }

    pub fn how_to_fix(mut self, hint: impl Into<String>) -> Self {
        self.how_to_fix = hint.into();
        self
    }

    pub fn locate(mut self, line: u32, col: u32) -> Self {
        self.spec_line = line;
        self.spec_col = col;
        self
    }

    pub fn on_request(mut self, path: &str, method: &str) -> Self {
        self.request_path = path.to_string();
        self.request_method = method.to_uppercase();
        self
    }

    pub fn for_spec_path(mut self, template: &str) -> Self {
        self.spec_path = template.to_string();
        self
    }

    pub fn for_parameter(mut self, name: &str) -> Self {
        self.parameter_name = Some(name.to_string());
        self
    }

    pub fn at_keyword(mut self, pointer: impl Into<String>) -> Self {
        self.keyword_location = Some(pointer.into());
        self
    }

    pub fn with_context(mut self, node: Arc<Value>) -> Self {
        self.context = Some(node);
        self
    }

    pub fn with_schema_failures(mut self, failures: Vec<SchemaValidationFailure>) -> Self {
        self.schema_validation_errors = failures;
        self
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.validation_sub_type {
            Some(sub) => write!(
                f,
                "[{}/{}] {}: {}",
                self.validation_type, sub, self.message, self.reason
            ),
            None => write!(f, "[{}] {}: {}", self.validation_type, self.message, self.reason),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The batched outcome of one validation entry point: `pass` is true exactly
/// when `errors` is empty, and errors appear in deterministic left-to-right
/// order (parameters in declaration order, items in array order).
#[derive(Debug, Default, Clone, Serialize)]
pub struct ValidationReport {
    pub pass: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn passing() -> Self {
        Self { pass: true, errors: Vec::new() }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self { pass: errors.is_empty(), errors }
    }

    pub fn failure(error: ValidationError) -> Self {
        Self::from_errors(vec![error])
    }

    pub fn push(&mut self, error: ValidationError) {
        self.pass = false;
        self.errors.push(error);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.pass = self.pass && other.pass;
        self.errors.extend(other.errors);
    }

    pub fn is_pass(&self) -> bool {
        self.pass
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_else(|e| format!("error: {}", e))
    }
}

static ROLLUP_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^'?(anyOf|allOf|oneOf|validation)'? failed(, none matched)?$").unwrap()
});

static POLYMORPHIC_ROLLUP_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^'?(anyOf|allOf|oneOf)'? failed(, none matched)?$").unwrap()
});

/// True for the engine's noise rollups ("anyOf failed", "'oneOf' failed, none
/// matched", …) which restate their child errors.
pub fn is_rollup_reason(reason: &str) -> bool {
    ROLLUP_MESSAGE.is_match(reason)
}

/// Like [`is_rollup_reason`] but only for the polymorphic keywords, keeping
/// generic "validation failed" messages visible.
pub fn is_polymorphic_rollup_reason(reason: &str) -> bool {
    POLYMORPHIC_ROLLUP_MESSAGE.is_match(reason)
}

/// Drops rollup failures when more specific child failures exist. A rollup
/// that is the sole failure is kept, since suppressing it would hide the
/// violation entirely.
pub fn suppress_rollups(failures: Vec<SchemaValidationFailure>) -> Vec<SchemaValidationFailure> {
    let has_specific = failures.iter().any(|f| !is_rollup_reason(&f.reason));
    if !has_specific {
        return failures;
    }
    failures.into_iter().filter(|f| !is_rollup_reason(&f.reason)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rollup_patterns() {
        assert!(is_rollup_reason("anyOf failed"));
        assert!(is_rollup_reason("'oneOf' failed, none matched"));
        assert!(is_rollup_reason("allOf failed"));
        assert!(is_rollup_reason("validation failed"));
        assert!(!is_rollup_reason("expected integer, found string"));
        assert!(!is_rollup_reason("anyOf failed somewhere"));

        assert!(is_polymorphic_rollup_reason("anyOf failed"));
        assert!(!is_polymorphic_rollup_reason("validation failed"));
    }

    #[test]
    fn test_suppress_rollups_keeps_sole_rollup() {
        let only = vec![SchemaValidationFailure::new("oneOf failed", vec![], "/s".into())];
        assert_eq!(suppress_rollups(only).len(), 1);

        let mixed = vec![
            SchemaValidationFailure::new("oneOf failed", vec![], "/s".into()),
            SchemaValidationFailure::new("expected integer", vec!["age".into()], "/s/type".into()),
        ];
        let kept = suppress_rollups(mixed);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].reason, "expected integer");
    }

    #[test]
    fn test_failure_field_derivation() {
        let failure = SchemaValidationFailure::new(
            "expected integer",
            vec!["items".into(), "0".into(), "first name".into()],
            "/properties/age/type".into(),
        );
        assert_eq!(failure.field_name, "first name");
        assert_eq!(failure.field_path, "$.items[0]['first name']");
    }

    #[test]
    fn test_report_merge_and_pass() {
        let mut report = ValidationReport::passing();
        assert!(report.is_pass());
        report.merge(ValidationReport::passing());
        assert!(report.is_pass());

        report.push(ValidationError::new(
            ValidationType::Parameter,
            ValidationSubType::Query,
            "Query parameter 'limit' is missing",
            "The parameter is required",
        ));
        assert!(!report.is_pass());
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_error_envelope_serializes_camel_case() {
        let err = ValidationError::new(
            ValidationType::Parameter,
            ValidationSubType::Cookie,
            "Cookie parameter 'PattyPreference' is missing",
            "required cookie absent",
        )
        .on_request("/burgers/beef", "get");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["validationType"], "parameter");
        assert_eq!(json["validationSubType"], "cookie");
        assert_eq!(json["requestMethod"], "GET");
        assert!(json.get("context").is_none());
    }
}
