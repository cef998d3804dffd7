//! Response-side validation: response-code lookup with `default` fallback,
//! content-type negotiation, declared response headers, and the body.

use crate::codec::{decode_simple, ValueTarget};
use crate::error::{ValidationError, ValidationReport, ValidationSubType, ValidationType};
use crate::types::json_path::JsonPath;
use crate::types::operation::Operation;
use crate::types::CancelToken;
use crate::validator::request_body::{BodyDirection, BodyValidator};
use crate::validator::{engine_failures, ValidationContext};
use crate::{CONTENT_FIELD, HEADERS_FIELD, REQUIRED_FIELD, RESPONSES_FIELD, SCHEMA_FIELD};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

const DEFAULT_RESPONSE_KEY: &str = "default";

pub(crate) struct ResponseValidator<'v> {
    ctx: &'v ValidationContext<'v>,
    operation: &'v Operation,
    request_path: &'v str,
}

impl<'v> ResponseValidator<'v> {
    pub(crate) fn new(
        ctx: &'v ValidationContext<'v>,
        operation: &'v Operation,
        request_path: &'v str,
    ) -> Self {
        Self { ctx, operation, request_path }
    }

    pub(crate) fn validate(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: Option<&Bytes>,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return ValidationReport::failure(ValidationError::aborted());
            }
        }

        let responses = match self.ctx.traverser.get_optional(self.operation.data(), RESPONSES_FIELD)
        {
            Ok(Some(found)) => found.value().clone(),
            Ok(None) => return ValidationReport::failure(self.code_error(status, &[])),
            Err(e) => {
                return ValidationReport::failure(ValidationError::internal(
                    "The responses section could not be traversed",
                    e.to_string(),
                ));
            }
        };
        let Some(responses_map) = responses.as_object() else {
            return ValidationReport::failure(ValidationError::internal(
                "The responses section is not an object",
                format!("Found {} where a response mapping was expected", responses),
            ));
        };

        // Exact status first, then the `default` fallback.
        let code = status.as_u16().to_string();
        let (selected_key, selected) = match responses_map.get(&code) {
            Some(entry) => (code.clone(), entry),
            None => match responses_map.get(DEFAULT_RESPONSE_KEY) {
                Some(entry) => (DEFAULT_RESPONSE_KEY.to_string(), entry),
                None => {
                    let declared: Vec<&str> = responses_map.keys().map(String::as_str).collect();
                    return ValidationReport::failure(self.code_error(status, &declared));
                }
            },
        };
        let selected = match self.ctx.traverser.resolve(selected) {
            Ok(found) => found.value().clone(),
            Err(e) => {
                return ValidationReport::failure(ValidationError::internal(
                    "The response entry could not be resolved",
                    e.to_string(),
                ));
            }
        };

        let mut response_path = self.operation.json_path().clone();
        response_path.add(RESPONSES_FIELD).add(&selected_key);

        let mut report = ValidationReport::passing();
        report.merge(self.validate_headers(&selected, &response_path, headers, cancel));

        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                report.push(ValidationError::aborted());
                return report;
            }
        }

        if let Some(content) = selected.get(CONTENT_FIELD) {
            let mut content_path = response_path.clone();
            content_path.add(CONTENT_FIELD);
            let content_type_header = headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let body_validator = BodyValidator::new(
                self.ctx,
                self.operation,
                self.request_path,
                BodyDirection::Response,
            );
            report.merge(body_validator.validate_against_content(
                content,
                &content_path,
                content_type_header,
                body,
                false,
            ));
        }
        report
    }

    /// Declared response headers are a mapping of name to header object with
    /// the same shape as an `in: header` parameter, minus `name` and `in`.
    fn validate_headers(
        &self,
        response_entry: &Value,
        response_path: &JsonPath,
        headers: &HeaderMap,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        let Some(declared) = response_entry.get(HEADERS_FIELD).and_then(|h| h.as_object()) else {
            return ValidationReport::passing();
        };

        let mut report = ValidationReport::passing();
        for (name, header_def) in declared {
            if let Some(cancel) = cancel {
                if cancel.is_cancelled() {
                    report.push(ValidationError::aborted());
                    return report;
                }
            }
            let header_def = match self.ctx.traverser.resolve(header_def) {
                Ok(found) => found.value().clone(),
                Err(e) => {
                    report.push(ValidationError::internal(
                        format!("The response header '{}' could not be resolved", name),
                        e.to_string(),
                    ));
                    continue;
                }
            };
            let required = header_def
                .get(REQUIRED_FIELD)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            let mut header_path = response_path.clone();
            header_path.add(HEADERS_FIELD).add(name);

            let observed = headers.get(name.as_str()).and_then(|v| v.to_str().ok());
            match observed {
                None => {
                    if required {
                        report.push(self.stamp(
                            ValidationError::new(
                                ValidationType::Response,
                                ValidationSubType::Header,
                                format!("Header '{}' is missing", name),
                                format!(
                                    "The response header '{}' is defined as being required, \
                                     yet is missing from the response",
                                    name
                                ),
                            )
                            .how_to_fix(format!("Add the header '{}' to the response", name)),
                            &header_path,
                        ));
                    }
                }
                Some(raw) => {
                    let Some(schema) = header_def.get(SCHEMA_FIELD) else { continue };
                    let schema = match self.ctx.traverser.resolve(schema) {
                        Ok(found) => found.value().clone(),
                        Err(e) => {
                            report.push(ValidationError::internal(
                                format!("The schema for response header '{}' could not be resolved", name),
                                e.to_string(),
                            ));
                            continue;
                        }
                    };
                    let decoded = decode_simple(raw, false, ValueTarget::of_schema(&schema));
                    let compiled = match self.ctx.compiler.compile_inline(&schema) {
                        Ok(compiled) => compiled,
                        Err(e) => {
                            report.push(ValidationError::internal(
                                format!("The schema for response header '{}' does not compile", name),
                                e.to_string(),
                            ));
                            continue;
                        }
                    };
                    let mut schema_keyword_path = header_path.clone();
                    schema_keyword_path.add(SCHEMA_FIELD);
                    let failures = engine_failures(
                        &compiled,
                        &decoded,
                        &schema_keyword_path,
                        self.ctx.locator,
                    );
                    if !failures.is_empty() {
                        let reason = failures
                            .first()
                            .map(|f| f.reason.clone())
                            .unwrap_or_default();
                        report.push(self.stamp(
                            ValidationError::new(
                                ValidationType::Response,
                                ValidationSubType::Header,
                                format!("Header '{}' failed schema validation", name),
                                reason,
                            )
                            .for_parameter(name)
                            .with_schema_failures(failures),
                            &schema_keyword_path,
                        ));
                    }
                }
            }
        }
        report
    }

    fn code_error(&self, status: StatusCode, declared: &[&str]) -> ValidationError {
        let mut responses_path = self.operation.json_path().clone();
        responses_path.add(RESPONSES_FIELD);
        let hint = if declared.is_empty() {
            "Declare the response code in the operation's responses".to_string()
        } else {
            format!("Use one of the declared response codes: '{}'", declared.join(", "))
        };
        self.stamp(
            ValidationError::new(
                ValidationType::Response,
                ValidationSubType::ResponseCode,
                format!("The response code '{}' is not declared", status.as_u16()),
                format!(
                    "ResponseCodeNotFound: the responses mapping has no entry for '{}' \
                     and no 'default' fallback",
                    status.as_u16()
                ),
            )
            .how_to_fix(hint),
            &responses_path,
        )
    }

    fn stamp(&self, error: ValidationError, spec_path: &JsonPath) -> ValidationError {
        let pointer = spec_path.pointer();
        let located = self.ctx.locator.key(&pointer).unwrap_or_default();
        error
            .on_request(self.request_path, self.operation.method())
            .for_spec_path(self.operation.template())
            .at_keyword(pointer)
            .locate(located.line, located.col)
    }
}
