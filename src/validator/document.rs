//! Whole-document validation: every `example`/`examples` node declared next
//! to a schema is validated against that schema, so drifting examples are
//! caught before they mislead consumers.

use crate::error::{ValidationError, ValidationReport, ValidationSubType, ValidationType};
use crate::router::HTTP_METHODS;
use crate::types::json_path::JsonPath;
use crate::types::CancelToken;
use crate::validator::{engine_failures, ValidationContext};
use crate::{
    CONTENT_FIELD, PARAMETERS_FIELD, PATHS_FIELD, REQUEST_BODY_FIELD, RESPONSES_FIELD,
    SCHEMA_FIELD,
};
use serde_json::Value;

const EXAMPLE_FIELD: &str = "example";
const EXAMPLES_FIELD: &str = "examples";
const COMPONENTS_FIELD: &str = "components";
const SCHEMAS_FIELD: &str = "schemas";

pub(crate) struct DocumentValidator<'v> {
    ctx: &'v ValidationContext<'v>,
}

impl<'v> DocumentValidator<'v> {
    pub(crate) fn new(ctx: &'v ValidationContext<'v>) -> Self {
        Self { ctx }
    }

    pub(crate) fn validate(&self, cancel: Option<&CancelToken>) -> ValidationReport {
        let mut report = ValidationReport::passing();
        let spec = self.ctx.traverser.specification();

        if let Some(paths) = spec.get(PATHS_FIELD).and_then(|p| p.as_object()) {
            for (template, path_item) in paths {
                if cancelled(cancel) {
                    report.push(ValidationError::aborted());
                    return report;
                }
                let mut path_pointer = JsonPath::new();
                path_pointer.add(PATHS_FIELD).add(template);
                for (method, operation) in
                    path_item.as_object().into_iter().flatten().filter(|(m, _)| {
                        HTTP_METHODS.contains(&m.as_str())
                    })
                {
                    let mut op_pointer = path_pointer.clone();
                    op_pointer.add(method);
                    self.check_operation(operation, &op_pointer, &mut report);
                }
            }
        }

        if let Some(schemas) = spec
            .get(COMPONENTS_FIELD)
            .and_then(|c| c.get(SCHEMAS_FIELD))
            .and_then(|s| s.as_object())
        {
            for (name, schema) in schemas {
                if cancelled(cancel) {
                    report.push(ValidationError::aborted());
                    return report;
                }
                let mut schema_pointer = JsonPath::new();
                schema_pointer.add(COMPONENTS_FIELD).add(SCHEMAS_FIELD).add(name);
                self.check_examples_next_to_schema(schema, &schema_pointer, &mut report);
            }
        }
        report
    }

    fn check_operation(
        &self,
        operation: &Value,
        op_pointer: &JsonPath,
        report: &mut ValidationReport,
    ) {
        if let Some(parameters) = operation.get(PARAMETERS_FIELD).and_then(|p| p.as_array()) {
            for (index, parameter) in parameters.iter().enumerate() {
                let resolved = match self.ctx.traverser.resolve(parameter) {
                    Ok(found) => found.value().clone(),
                    Err(_) => continue,
                };
                if resolved.get(SCHEMA_FIELD).is_none() {
                    continue;
                }
                let mut schema_pointer = op_pointer.clone();
                schema_pointer.add(PARAMETERS_FIELD).add(index.to_string()).add(SCHEMA_FIELD);
                self.check_example_carrier(&resolved, &schema_pointer, report);
                if let Some(schema) = resolved.get(SCHEMA_FIELD) {
                    self.check_examples_next_to_schema(schema, &schema_pointer, report);
                }
            }
        }

        if let Some(content) = operation
            .get(REQUEST_BODY_FIELD)
            .and_then(|b| b.get(CONTENT_FIELD))
            .and_then(|c| c.as_object())
        {
            for (media_type, media_node) in content {
                let mut schema_pointer = op_pointer.clone();
                schema_pointer
                    .add(REQUEST_BODY_FIELD)
                    .add(CONTENT_FIELD)
                    .add(media_type)
                    .add(SCHEMA_FIELD);
                self.check_example_carrier(media_node, &schema_pointer, report);
            }
        }

        if let Some(responses) = operation.get(RESPONSES_FIELD).and_then(|r| r.as_object()) {
            for (code, response) in responses {
                let Some(content) =
                    response.get(CONTENT_FIELD).and_then(|c| c.as_object())
                else {
                    continue;
                };
                for (media_type, media_node) in content {
                    let mut schema_pointer = op_pointer.clone();
                    schema_pointer
                        .add(RESPONSES_FIELD)
                        .add(code)
                        .add(CONTENT_FIELD)
                        .add(media_type)
                        .add(SCHEMA_FIELD);
                    self.check_example_carrier(media_node, &schema_pointer, report);
                }
            }
        }
    }

    /// Checks the `example`/`examples` declared on a node that carries a
    /// sibling `schema` (parameter objects, media-type objects).
    fn check_example_carrier(
        &self,
        carrier: &Value,
        schema_pointer: &JsonPath,
        report: &mut ValidationReport,
    ) {
        if carrier.get(SCHEMA_FIELD).is_none() {
            return;
        }
        if let Some(example) = carrier.get(EXAMPLE_FIELD) {
            self.check_example(example, schema_pointer, report);
        }
        if let Some(examples) = carrier.get(EXAMPLES_FIELD).and_then(|e| e.as_object()) {
            for named in examples.values() {
                // Example objects wrap the payload in `value`.
                if let Some(value) = named.get("value") {
                    self.check_example(value, schema_pointer, report);
                }
            }
        }
    }

    /// Checks an `example` declared inside the schema itself.
    fn check_examples_next_to_schema(
        &self,
        schema: &Value,
        schema_pointer: &JsonPath,
        report: &mut ValidationReport,
    ) {
        if let Some(example) = schema.get(EXAMPLE_FIELD) {
            self.check_example(example, schema_pointer, report);
        }
    }

    fn check_example(
        &self,
        example: &Value,
        schema_pointer: &JsonPath,
        report: &mut ValidationReport,
    ) {
        let compiled = match self.ctx.compiler.compile_pointer(schema_pointer) {
            Ok(compiled) => compiled,
            Err(e) => {
                report.push(ValidationError::internal(
                    "A schema with examples does not compile",
                    e.to_string(),
                ));
                return;
            }
        };
        let failures = engine_failures(&compiled, example, schema_pointer, self.ctx.locator);
        if failures.is_empty() {
            return;
        }
        let pointer = schema_pointer.pointer();
        let located = self.ctx.locator.key(&pointer).unwrap_or_default();
        let reason = failures.first().map(|f| f.reason.clone()).unwrap_or_default();
        report.push(
            ValidationError::new(
                ValidationType::Schema,
                ValidationSubType::Schema,
                "A declared example does not match its schema",
                reason,
            )
            .at_keyword(pointer)
            .locate(located.line, located.col)
            .with_schema_failures(failures),
        );
    }
}

fn cancelled(cancel: Option<&CancelToken>) -> bool {
    cancel.is_some_and(CancelToken::is_cancelled)
}
