//! The public validator surface: route an exchange, fan out to the
//! parameter, body, response and document validators, and batch every
//! independent violation into one report.

pub mod builder;
mod document;
mod parameters;
mod request_body;
mod response;

use crate::converter::{HttpBody, HttpLike, HttpResponseLike};
use crate::error::{
    suppress_rollups, SchemaValidationFailure, ValidationError, ValidationReport,
    ValidationSubType, ValidationType,
};
use crate::locator::SpecLocator;
use crate::router::{PathRouter, RouteDecision};
use crate::schema::SchemaCompiler;
use crate::traverser::OpenApiTraverser;
use crate::types::json_path::{unescape_segment, JsonPath};
use crate::types::operation::{Operation, RouteMatch};
use crate::types::CancelToken;
use crate::validator::builder::OpenApiValidatorBuilder;
use crate::validator::document::DocumentValidator;
use crate::validator::parameters::ParameterValidator;
use crate::validator::request_body::{BodyDirection, BodyValidator};
use crate::validator::response::ResponseValidator;
use crate::{CONTENT_FIELD, PATHS_FIELD, REQUEST_BODY_FIELD, REQUIRED_FIELD};
use jsonschema::Validator as EngineValidator;
use serde_json::Value;
use std::sync::Arc;

/// Shared read-only state handed to the per-concern validators.
pub(crate) struct ValidationContext<'v> {
    pub traverser: &'v OpenApiTraverser,
    pub compiler: &'v SchemaCompiler,
    pub locator: &'v SpecLocator,
}

/// Validates live HTTP exchanges against one OpenAPI document.
///
/// The validator is immutable after construction and safe to share across
/// concurrent requests; the compiled-template and compiled-schema caches use
/// idempotent inserts.
#[derive(Debug)]
pub struct OpenApiValidator {
    traverser: OpenApiTraverser,
    compiler: SchemaCompiler,
    router: PathRouter,
    locator: SpecLocator,
}

impl OpenApiValidator {
    /// Builds a validator from an already-parsed document with the default
    /// options. Use [`OpenApiValidatorBuilder`] to set options or keep
    /// source locations.
    pub fn from_value(spec: Value) -> Result<Self, builder::ValidatorBuildError> {
        OpenApiValidatorBuilder::new().with_value(spec).build()
    }

    pub(crate) fn assemble(
        traverser: OpenApiTraverser,
        compiler: SchemaCompiler,
        router: PathRouter,
        locator: SpecLocator,
    ) -> Self {
        Self { traverser, compiler, router, locator }
    }

    pub fn traverser(&self) -> &OpenApiTraverser {
        &self.traverser
    }

    fn ctx(&self) -> ValidationContext<'_> {
        ValidationContext {
            traverser: &self.traverser,
            compiler: &self.compiler,
            locator: &self.locator,
        }
    }

    /// Composite request validation: routing, all four parameter kinds, and
    /// the body. Every independent violation is reported.
    pub fn validate_request<T: HttpBody>(&self, request: &impl HttpLike<T>) -> ValidationReport {
        self.validate_request_inner(request, None)
    }

    pub fn validate_request_cancellable<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: &CancelToken,
    ) -> ValidationReport {
        self.validate_request_inner(request, Some(cancel))
    }

    fn validate_request_inner<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        let routed = match self.route(request.path_ref(), request.method_ref().as_str()) {
            Ok(routed) => routed,
            Err(error) => return ValidationReport::failure(error),
        };
        let ctx = self.ctx();
        let validator = ParameterValidator::new(
            &ctx,
            routed.operation(),
            routed.path_item(),
            request.path_ref(),
        );

        let mut report = ValidationReport::passing();
        report.merge(validator.validate_path(routed.path_vars(), cancel));
        report.merge(validator.validate_query(request.query_ref(), cancel));
        report.merge(validator.validate_headers(request.headers_ref(), cancel));
        report.merge(validator.validate_cookies(request.headers_ref(), cancel));
        report.merge(self.body_report(&ctx, routed.operation(), request, cancel));
        report
    }

    pub fn validate_query_params<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Query, None)
    }

    pub fn validate_path_params<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Path, None)
    }

    pub fn validate_header_params<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Header, None)
    }

    pub fn validate_cookie_params<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Cookie, None)
    }

    pub fn validate_query_params_cancellable<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: &CancelToken,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Query, Some(cancel))
    }

    pub fn validate_path_params_cancellable<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: &CancelToken,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Path, Some(cancel))
    }

    pub fn validate_header_params_cancellable<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: &CancelToken,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Header, Some(cancel))
    }

    pub fn validate_cookie_params_cancellable<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: &CancelToken,
    ) -> ValidationReport {
        self.params_report(request, ParameterKind::Cookie, Some(cancel))
    }

    fn params_report<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        kind: ParameterKind,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        let routed = match self.route(request.path_ref(), request.method_ref().as_str()) {
            Ok(routed) => routed,
            Err(error) => return ValidationReport::failure(error),
        };
        let ctx = self.ctx();
        let validator = ParameterValidator::new(
            &ctx,
            routed.operation(),
            routed.path_item(),
            request.path_ref(),
        );
        match kind {
            ParameterKind::Query => validator.validate_query(request.query_ref(), cancel),
            ParameterKind::Path => validator.validate_path(routed.path_vars(), cancel),
            ParameterKind::Header => validator.validate_headers(request.headers_ref(), cancel),
            ParameterKind::Cookie => validator.validate_cookies(request.headers_ref(), cancel),
        }
    }

    /// Pre-routed variant for callers that already hold the path item.
    pub fn validate_query_params_with_path_item<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        path_item: &Value,
        spec_path: &str,
    ) -> ValidationReport {
        self.with_path_item(request, path_item, spec_path, |validator, _| {
            validator.validate_query(request.query_ref(), None)
        })
    }

    pub fn validate_header_params_with_path_item<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        path_item: &Value,
        spec_path: &str,
    ) -> ValidationReport {
        self.with_path_item(request, path_item, spec_path, |validator, _| {
            validator.validate_headers(request.headers_ref(), None)
        })
    }

    pub fn validate_cookie_params_with_path_item<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        path_item: &Value,
        spec_path: &str,
    ) -> ValidationReport {
        self.with_path_item(request, path_item, spec_path, |validator, _| {
            validator.validate_cookies(request.headers_ref(), None)
        })
    }

    pub fn validate_path_params_with_path_item<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        path_item: &Value,
        spec_path: &str,
    ) -> ValidationReport {
        let vars = match crate::router::compiled_template(spec_path) {
            Ok(compiled) => compiled.matches(request.path_ref()).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        self.with_path_item(request, path_item, spec_path, |validator, _| {
            validator.validate_path(&vars, None)
        })
    }

    fn with_path_item<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        path_item: &Value,
        spec_path: &str,
        run: impl Fn(&ParameterValidator<'_>, &Operation) -> ValidationReport,
    ) -> ValidationReport {
        let method = request.method_ref().as_str();
        let (operation, resolved_item) =
            match self.operation_from_path_item(path_item, spec_path, method, request.path_ref()) {
                Ok(parts) => parts,
                Err(error) => return ValidationReport::failure(error),
            };
        let ctx = self.ctx();
        let validator =
            ParameterValidator::new(&ctx, &operation, &resolved_item, request.path_ref());
        run(&validator, &operation)
    }

    /// Validates the request body against the operation's `requestBody`.
    pub fn validate_request_body<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
    ) -> ValidationReport {
        self.validate_request_body_inner(request, None)
    }

    pub fn validate_request_body_cancellable<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: &CancelToken,
    ) -> ValidationReport {
        self.validate_request_body_inner(request, Some(cancel))
    }

    fn validate_request_body_inner<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return ValidationReport::failure(ValidationError::aborted());
            }
        }
        let routed = match self.route(request.path_ref(), request.method_ref().as_str()) {
            Ok(routed) => routed,
            Err(error) => return ValidationReport::failure(error),
        };
        let ctx = self.ctx();
        self.body_report(&ctx, routed.operation(), request, cancel)
    }

    /// Pre-routed body variant for callers that already hold the path item.
    pub fn validate_request_body_with_path_item<T: HttpBody>(
        &self,
        request: &impl HttpLike<T>,
        path_item: &Value,
        spec_path: &str,
    ) -> ValidationReport {
        let method = request.method_ref().as_str();
        let (operation, _) = match self.operation_from_path_item(
            path_item,
            spec_path,
            method,
            request.path_ref(),
        ) {
            Ok(parts) => parts,
            Err(error) => return ValidationReport::failure(error),
        };
        let ctx = self.ctx();
        self.body_report(&ctx, &operation, request, None)
    }

    fn body_report<T: HttpBody>(
        &self,
        ctx: &ValidationContext<'_>,
        operation: &Operation,
        request: &impl HttpLike<T>,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return ValidationReport::failure(ValidationError::aborted());
            }
        }
        let body = request.body_ref().as_bytes();
        let content_type = request
            .headers_ref()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let request_body = match operation.data().get(REQUEST_BODY_FIELD) {
            Some(node) => match self.traverser.resolve(node) {
                Ok(found) => found.value().clone(),
                Err(e) => {
                    return ValidationReport::failure(ValidationError::internal(
                        "The requestBody section could not be resolved",
                        e.to_string(),
                    ));
                }
            },
            None => {
                if body.is_some() {
                    return ValidationReport::failure(
                        ValidationError::new(
                            ValidationType::Request,
                            ValidationSubType::Body,
                            "A request body was provided but none is declared",
                            "The operation does not define a requestBody section",
                        )
                        .on_request(request.path_ref(), operation.method())
                        .for_spec_path(operation.template()),
                    );
                }
                return ValidationReport::passing();
            }
        };

        let required = request_body
            .get(REQUIRED_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let Some(content) = request_body.get(CONTENT_FIELD) else {
            return ValidationReport::passing();
        };

        let mut content_path = operation.json_path().clone();
        content_path.add(REQUEST_BODY_FIELD).add(CONTENT_FIELD);

        let validator =
            BodyValidator::new(ctx, operation, request.path_ref(), BodyDirection::Request);
        validator.validate_against_content(
            content,
            &content_path,
            content_type,
            body.as_ref(),
            required,
        )
    }

    /// Validates a response against the declared responses of the matched
    /// operation: status lookup with `default` fallback, content type,
    /// declared headers, body.
    pub fn validate_response<T, R>(
        &self,
        request: &impl HttpLike<T>,
        response: &impl HttpResponseLike<R>,
    ) -> ValidationReport
    where
        T: HttpBody,
        R: HttpBody,
    {
        self.validate_response_inner(request, response, None)
    }

    pub fn validate_response_cancellable<T, R>(
        &self,
        request: &impl HttpLike<T>,
        response: &impl HttpResponseLike<R>,
        cancel: &CancelToken,
    ) -> ValidationReport
    where
        T: HttpBody,
        R: HttpBody,
    {
        self.validate_response_inner(request, response, Some(cancel))
    }

    fn validate_response_inner<T, R>(
        &self,
        request: &impl HttpLike<T>,
        response: &impl HttpResponseLike<R>,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport
    where
        T: HttpBody,
        R: HttpBody,
    {
        let routed = match self.route(request.path_ref(), request.method_ref().as_str()) {
            Ok(routed) => routed,
            Err(error) => return ValidationReport::failure(error),
        };
        let ctx = self.ctx();
        let validator = ResponseValidator::new(&ctx, routed.operation(), request.path_ref());
        let body = response.body_ref().as_bytes();
        validator.validate(response.status_ref(), response.headers_ref(), body.as_ref(), cancel)
    }

    /// Validates the document itself: every declared example is checked
    /// against its schema.
    pub fn validate_document(&self) -> ValidationReport {
        let ctx = self.ctx();
        DocumentValidator::new(&ctx).validate(None)
    }

    pub fn validate_document_cancellable(&self, cancel: &CancelToken) -> ValidationReport {
        let ctx = self.ctx();
        DocumentValidator::new(&ctx).validate(Some(cancel))
    }

    /// Routes a request to its operation, building the provenance both the
    /// engine (`paths/~1x/get`) and the error envelope need.
    fn route(&self, path: &str, method: &str) -> Result<RouteMatch, ValidationError> {
        let decision = self.router.route(path, method).map_err(|e| {
            ValidationError::internal("A path template does not compile", e.to_string())
        })?;
        match decision {
            RouteDecision::Matched { template, vars } => {
                let raw_item = self
                    .traverser
                    .specification()
                    .get(PATHS_FIELD)
                    .and_then(|paths| paths.get(&template))
                    .ok_or_else(|| {
                        ValidationError::internal(
                            "The routed template vanished from the document",
                            format!("No path item found for template '{}'", template),
                        )
                    })?;
                let path_item = self
                    .traverser
                    .resolve(raw_item)
                    .map_err(|e| {
                        ValidationError::internal(
                            "The path item could not be resolved",
                            e.to_string(),
                        )
                    })?
                    .value()
                    .clone();
                let (operation, path_item) =
                    self.build_operation(path_item, &template, method, path)?;
                Ok(RouteMatch { operation: Arc::new(operation), path_item, path_vars: vars })
            }
            RouteDecision::MethodMissing { template } => {
                Err(self.operation_missing_error(&template, method, path))
            }
            RouteDecision::NotFound => {
                let error = ValidationError::new(
                    ValidationType::Path,
                    ValidationSubType::Missing,
                    format!("{} Path '{}' not found", method.to_uppercase(), path),
                    format!(
                        "PathNotFound: the request path '{}' does not match any template \
                         declared in the document",
                        path
                    ),
                )
                .how_to_fix("Check the path template and parameter patterns in the document")
                .on_request(path, method);
                Err(error)
            }
        }
    }

    fn operation_from_path_item(
        &self,
        path_item: &Value,
        template: &str,
        method: &str,
        request_path: &str,
    ) -> Result<(Operation, Value), ValidationError> {
        let path_item = self
            .traverser
            .resolve(path_item)
            .map_err(|e| {
                ValidationError::internal("The path item could not be resolved", e.to_string())
            })?
            .value()
            .clone();
        self.build_operation(path_item, template, method, request_path)
    }

    fn build_operation(
        &self,
        path_item: Value,
        template: &str,
        method: &str,
        request_path: &str,
    ) -> Result<(Operation, Value), ValidationError> {
        let method_lower = method.to_lowercase();
        let data = path_item
            .get(&method_lower)
            .cloned()
            .ok_or_else(|| self.operation_missing_error(template, method, request_path))?;
        let mut op_path = JsonPath::new();
        op_path.add(PATHS_FIELD).add(template).add(&method_lower);
        let operation = Operation {
            data,
            path: op_path,
            template: template.to_string(),
            method: method_lower,
        };
        Ok((operation, path_item))
    }

    fn operation_missing_error(
        &self,
        template: &str,
        method: &str,
        request_path: &str,
    ) -> ValidationError {
        let mut pointer = JsonPath::new();
        pointer.add(PATHS_FIELD).add(template);
        let located = self.locator.key(&pointer.pointer()).unwrap_or_default();
        ValidationError::new(
            ValidationType::Path,
            ValidationSubType::MissingOperation,
            format!(
                "{} operation on path '{}' is not defined",
                method.to_uppercase(),
                template
            ),
            format!(
                "OperationNotFound: the path item for '{}' declares no '{}' operation",
                template,
                method.to_lowercase()
            ),
        )
        .how_to_fix(format!("Add a '{}' operation to the path item", method.to_lowercase()))
        .on_request(request_path, method)
        .for_spec_path(template)
        .at_keyword(pointer.pointer())
        .locate(located.line, located.col)
    }
}

#[derive(Clone, Copy)]
enum ParameterKind {
    Query,
    Path,
    Header,
    Cookie,
}

/// Translates the engine's error stream into located
/// [`SchemaValidationFailure`]s, dropping noise rollups when child errors
/// exist.
pub(crate) fn engine_failures(
    compiled: &EngineValidator,
    instance: &Value,
    keyword_base: &JsonPath,
    locator: &SpecLocator,
) -> Vec<SchemaValidationFailure> {
    let mut failures = Vec::new();
    for error in compiled.iter_errors(instance) {
        let reason = error.to_string();
        let instance_pointer = error.instance_path.to_string();
        let instance_segments = pointer_segments(&instance_pointer);

        let schema_suffix = error.schema_path.to_string();
        let schema_suffix =
            schema_suffix.strip_prefix("/$ref").unwrap_or(schema_suffix.as_str());
        let keyword_pointer = format!("{}{}", keyword_base.pointer(), schema_suffix);

        let located = locator
            .key(&keyword_pointer)
            .or_else(|| locator.key(&keyword_base.pointer()))
            .unwrap_or_default();
        let offending = instance.pointer(&instance_pointer);

        failures.push(
            SchemaValidationFailure::new(reason, instance_segments, keyword_pointer)
                .with_rendered(None, offending)
                .at(located.line, located.col),
        );
    }
    suppress_rollups(failures)
}

fn pointer_segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer.split('/').skip(1).map(unescape_segment).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn petstore() -> OpenApiValidator {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "Pets", "version": "1.0.0" },
            "paths": {
                "/pets": {
                    "get": {
                        "parameters": [
                            {
                                "name": "limit",
                                "in": "query",
                                "required": true,
                                "schema": { "type": "integer", "minimum": 1, "maximum": 100 }
                            }
                        ],
                        "responses": { "200": { "description": "OK" } }
                    },
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["name"],
                                        "properties": {
                                            "name": { "type": "string" },
                                            "age": { "type": "integer" }
                                        }
                                    }
                                }
                            }
                        },
                        "responses": { "201": { "description": "Created" } }
                    }
                },
                "/pets/{petId}": {
                    "get": {
                        "parameters": [
                            {
                                "name": "petId",
                                "in": "path",
                                "required": true,
                                "schema": { "type": "integer" }
                            }
                        ],
                        "responses": { "200": { "description": "OK" } }
                    }
                }
            }
        });
        OpenApiValidator::from_value(spec).unwrap()
    }

    #[test]
    fn test_valid_request_passes() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets?limit=10")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(report.is_pass(), "{:?}", report.errors);
    }

    #[test]
    fn test_missing_required_query_parameter() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert_eq!(error.message, "Query parameter 'limit' is missing");
        assert_eq!(error.validation_type, ValidationType::Parameter);
        assert_eq!(error.validation_sub_type, Some(ValidationSubType::Query));
    }

    #[test]
    fn test_unknown_path_and_method() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/rockets")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert_eq!(report.errors[0].validation_sub_type, Some(ValidationSubType::Missing));

        let request = http::Request::builder()
            .method("DELETE")
            .uri("https://example.com/pets?limit=3")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert_eq!(
            report.errors[0].validation_sub_type,
            Some(ValidationSubType::MissingOperation)
        );
        assert_eq!(report.errors[0].validation_type, ValidationType::Path);
    }

    #[test]
    fn test_path_parameter_extraction_and_type_check() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets/42")
            .body(())
            .unwrap();
        assert!(validator.validate_request(&request).is_pass());

        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets/not-a-number")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors[0].parameter_name.as_deref(), Some("petId"));
    }

    #[test]
    fn test_request_body_validation() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/pets")
            .header("content-type", "application/json")
            .body(json!({ "name": "Ruby", "age": 5 }))
            .unwrap();
        assert!(validator.validate_request(&request).is_pass());

        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/pets")
            .header("content-type", "application/json")
            .body(json!({ "age": 5 }))
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors[0].validation_type, ValidationType::Request);
        assert!(!report.errors[0].schema_validation_errors.is_empty());
    }

    #[test]
    fn test_undeclared_content_type() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/pets")
            .header("content-type", "text/csv")
            .body("name,age\nRuby,5".to_string())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        let error = &report.errors[0];
        assert_eq!(error.validation_sub_type, Some(ValidationSubType::ContentType));
        assert!(error.how_to_fix.contains("application/json"));
    }

    #[test]
    fn test_sibling_parameters_all_reported() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/multi": {
                    "get": {
                        "parameters": [
                            { "name": "a", "in": "query", "required": true,
                              "schema": { "type": "integer" } },
                            { "name": "b", "in": "query", "required": true,
                              "schema": { "type": "integer" } }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/multi")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].parameter_name.as_deref(), Some("a"));
        assert_eq!(report.errors[1].parameter_name.as_deref(), Some("b"));
    }

    #[test]
    fn test_cancellation_aborts() {
        let validator = petstore();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets?limit=10")
            .body(())
            .unwrap();
        let token = CancelToken::new();
        token.cancel();
        let report = validator.validate_request_cancellable(&request, &token);
        assert!(!report.is_pass());
        assert!(report.errors.iter().any(|e| e.message == "Validation aborted"));
    }

    #[test]
    fn test_pointer_segments() {
        assert!(pointer_segments("").is_empty());
        assert_eq!(pointer_segments("/a/0/b"), vec!["a", "0", "b"]);
        assert_eq!(pointer_segments("/a~1b/c~0d"), vec!["a/b", "c~d"]);
    }

    #[test]
    fn test_missing_required_cookie() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "Burgers", "version": "1.0.0" },
            "paths": {
                "/burgers/beef": {
                    "get": {
                        "parameters": [
                            {
                                "name": "PattyPreference",
                                "in": "cookie",
                                "required": true,
                                "schema": { "type": "integer" }
                            }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/burgers/beef")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert_eq!(error.message, "Cookie parameter 'PattyPreference' is missing");
        assert_eq!(error.validation_sub_type, Some(ValidationSubType::Cookie));
    }

    #[test]
    fn test_cookie_names_match_case_sensitively() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/c": {
                    "get": {
                        "parameters": [
                            { "name": "Session", "in": "cookie", "required": true,
                              "schema": { "type": "string" } }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/c")
            .header("cookie", "session=lowercase-name")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());

        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/c")
            .header("cookie", "Session=value")
            .body(())
            .unwrap();
        assert!(validator.validate_request(&request).is_pass());
    }

    #[test]
    fn test_query_enum_violation_location_and_hint() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/x": {
                    "get": {
                        "parameters": [
                            {
                                "name": "status",
                                "in": "query",
                                "schema": { "type": "string", "enum": ["a", "b", "c"] }
                            }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/x?status=z")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert!(error.how_to_fix.contains("'a, b, c'"), "{}", error.how_to_fix);
        assert_eq!(
            error.keyword_location.as_deref(),
            Some("/paths/x/get/parameters/status/schema/enum")
        );
    }

    #[test]
    fn test_type_failure_settles_before_enum() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/x": {
                    "get": {
                        "parameters": [
                            {
                                "name": "status",
                                "in": "query",
                                "schema": { "type": "integer", "enum": [1, 2, 3] }
                            }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/x?status=abc")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert_eq!(error.message, "Query parameter 'status' is not a valid integer");
        assert!(!error.how_to_fix.contains("allowed values"), "{}", error.how_to_fix);

        // A well-typed value outside the enumeration still reports the enum.
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/x?status=9")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(report.errors[0].how_to_fix.contains("'1, 2, 3'"));
    }

    #[test]
    fn test_nullable_parameter_keeps_its_constraints() {
        // The 3.0.x nullable rewrite turns `type` into ["string", "null"];
        // the minLength constraint must still be enforced.
        let spec = json!({
            "openapi": "3.0.2",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/n": {
                    "get": {
                        "parameters": [
                            {
                                "name": "name",
                                "in": "query",
                                "schema": {
                                    "type": "string",
                                    "nullable": true,
                                    "minLength": 3
                                }
                            }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/n?name=ab")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors[0].parameter_name.as_deref(), Some("name"));

        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/n?name=abcd")
            .body(())
            .unwrap();
        assert!(validator.validate_request(&request).is_pass());
    }

    #[test]
    fn test_deep_object_multi_value_rejected() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/search": {
                    "get": {
                        "parameters": [
                            {
                                "name": "filter",
                                "in": "query",
                                "style": "deepObject",
                                "explode": true,
                                "schema": { "type": "object" }
                            }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/search?filter%5Ba%5D=1&filter%5Ba%5D=2")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        let error = &report.errors[0];
        assert!(error.reason.starts_with("InvalidDeepObject"), "{}", error.reason);
        assert!(error.reason.contains("multiple values (2)"), "{}", error.reason);
    }

    #[test]
    fn test_inline_path_pattern_routing() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/orders/{id:[0-9]+}/items/{itemId}": {
                    "get": { "responses": { "200": { "description": "OK" } } }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();

        let routed = validator.route("/orders/42/items/widget", "GET").unwrap();
        assert_eq!(routed.path_var("id"), Some("42"));
        assert_eq!(routed.path_var("itemId"), Some("widget"));

        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/orders/abc/items/x")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert_eq!(report.errors[0].validation_type, ValidationType::Path);
        assert_eq!(report.errors[0].validation_sub_type, Some(ValidationSubType::Missing));
        assert!(report.errors[0].reason.starts_with("PathNotFound"));
    }

    #[test]
    fn test_header_parameter_lookup_is_case_insensitive() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/h": {
                    "get": {
                        "parameters": [
                            { "name": "X-Trace", "in": "header", "required": true,
                              "schema": { "type": "string", "minLength": 3 } }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/h")
            .header("x-trace", "abc123")
            .body(())
            .unwrap();
        assert!(validator.validate_request(&request).is_pass());

        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/h")
            .header("x-trace", "ab")
            .body(())
            .unwrap();
        assert!(!validator.validate_request(&request).is_pass());
    }

    #[test]
    fn test_form_urlencoded_body() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/form": {
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/x-www-form-urlencoded": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["name", "age"],
                                        "properties": {
                                            "name": { "type": "string" },
                                            "age": { "type": "integer" }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/form")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("name=Ruby&age=5".to_string())
            .unwrap();
        assert!(validator.validate_request(&request).is_pass());

        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/form")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("name=Ruby".to_string())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert_eq!(report.errors[0].validation_type, ValidationType::Urlencoded);
    }

    #[test]
    fn test_multipart_body() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/upload": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "multipart/form-data": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["age"],
                                        "properties": {
                                            "age": { "type": "integer" },
                                            "photo": { "type": "string" }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let body = "--XB\r\nContent-Disposition: form-data; name=\"age\"\r\n\r\n5\r\n--XB--\r\n";
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/upload")
            .header("content-type", "multipart/form-data; boundary=XB")
            .body(body.to_string())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(report.is_pass(), "{:?}", report.errors);
    }

    #[test]
    fn test_xml_body_with_metadata() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/pets": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/xml": {
                                    "schema": {
                                        "type": "object",
                                        "xml": { "name": "pet", "prefix": "p", "namespace": "urn:pets" },
                                        "required": ["name"],
                                        "properties": { "name": { "type": "string" } }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let body = r#"<p:pet xmlns:p="urn:pets"><name>Ruby</name></p:pet>"#;
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/pets")
            .header("content-type", "application/xml")
            .body(body.to_string())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(report.is_pass(), "{:?}", report.errors);

        let body = r#"<q:pet xmlns:q="urn:other"><name>Ruby</name></q:pet>"#;
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/pets")
            .header("content-type", "application/xml")
            .body(body.to_string())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        assert!(report
            .errors
            .iter()
            .any(|e| e.validation_sub_type == Some(ValidationSubType::Prefix)));
        assert!(report
            .errors
            .iter()
            .any(|e| e.validation_sub_type == Some(ValidationSubType::Namespace)));
    }

    #[test]
    fn test_response_code_lookup_with_default_fallback() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "required": ["name"],
                                            "properties": { "name": { "type": "string" } }
                                        }
                                    }
                                }
                            },
                            "default": { "description": "fallback" }
                        }
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets")
            .body(())
            .unwrap();

        let response = http::Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(json!({ "name": "Ruby" }))
            .unwrap();
        assert!(validator.validate_response(&request, &response).is_pass());

        // 500 falls through to `default`, which declares no content.
        let response = http::Response::builder().status(500).body(()).unwrap();
        assert!(validator.validate_response(&request, &response).is_pass());

        let response = http::Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(json!({ "age": 5 }))
            .unwrap();
        let report = validator.validate_response(&request, &response);
        assert!(!report.is_pass());
        assert_eq!(report.errors[0].validation_type, ValidationType::Response);
    }

    #[test]
    fn test_response_code_not_found() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/pets": {
                    "get": { "responses": { "200": { "description": "OK" } } }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/pets")
            .body(())
            .unwrap();
        let response = http::Response::builder().status(404).body(()).unwrap();
        let report = validator.validate_response(&request, &response);
        assert!(!report.is_pass());
        assert_eq!(
            report.errors[0].validation_sub_type,
            Some(ValidationSubType::ResponseCode)
        );
        assert!(report.errors[0].how_to_fix.contains("200"));
    }

    #[test]
    fn test_optional_absent_parameters_produce_no_errors() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/opt": {
                    "get": {
                        "parameters": [
                            { "name": "q", "in": "query", "schema": { "type": "string" } },
                            { "name": "h", "in": "header", "schema": { "type": "integer" } },
                            { "name": "c", "in": "cookie", "schema": { "type": "boolean" } }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/opt")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(report.is_pass());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_operation_parameters_shadow_path_level() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/s": {
                    "parameters": [
                        { "name": "limit", "in": "query", "required": true,
                          "schema": { "type": "integer" } }
                    ],
                    "get": {
                        "parameters": [
                            { "name": "limit", "in": "query", "required": false,
                              "schema": { "type": "integer" } }
                        ]
                    }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/s")
            .body(())
            .unwrap();
        // The operation-level declaration relaxes `required`.
        assert!(validator.validate_request(&request).is_pass());
    }

    #[test]
    fn test_spec_locations_stamped_from_json_text() {
        let text = r#"{
  "openapi": "3.1.0",
  "info": { "title": "t", "version": "1" },
  "paths": {
    "/x": {
      "get": {
        "parameters": [
          {
            "name": "status",
            "in": "query",
            "required": true,
            "schema": { "type": "string" }
          }
        ]
      }
    }
  }
}"#;
        let validator = OpenApiValidatorBuilder::new().with_text(text).build().unwrap();
        let request = http::Request::builder()
            .method("GET")
            .uri("https://example.com/x")
            .body(())
            .unwrap();
        let report = validator.validate_request(&request);
        assert!(!report.is_pass());
        let error = &report.errors[0];
        // The `required` keyword sits on line 11 of the source text.
        assert_eq!(error.spec_line, 11);
        assert!(error.spec_col > 0);
    }

    #[test]
    fn test_validate_document_flags_bad_examples() {
        let spec = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": {},
            "components": {
                "schemas": {
                    "Age": { "type": "integer", "example": "not-a-number" }
                }
            }
        });
        let validator = OpenApiValidator::from_value(spec).unwrap();
        let report = validator.validate_document();
        assert!(!report.is_pass());
        assert_eq!(report.errors[0].validation_type, ValidationType::Schema);
    }
}
