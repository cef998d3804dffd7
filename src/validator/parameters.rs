//! Per-request validation of declared parameters: locate the raw wire input,
//! gate it on style consistency, reconstruct the typed value through the
//! style codec, and validate the reconstruction against the parameter schema.
//! A failure stops the chain for that parameter only; sibling parameters are
//! always validated.

use crate::codec::{
    self, check_style_consistency, decode_deep_object, decode_delimited, decode_form,
    decode_label, decode_matrix, decode_simple, parse_query, ParameterStyle, QueryParam,
    StyleFault, ValueTarget,
};
use crate::error::{ValidationError, ValidationReport, ValidationSubType, ValidationType};
use crate::types::json_path::JsonPath;
use crate::types::operation::Operation;
use crate::types::primitive::PrimitiveType;
use crate::types::{CancelToken, ParameterLocation};
use crate::validator::{engine_failures, ValidationContext};
use crate::{
    ALLOW_RESERVED_FIELD, CONTENT_FIELD, ENUM_FIELD, EXPLODE_FIELD, IN_FIELD, ITEMS_FIELD,
    NAME_FIELD, PARAMETERS_FIELD, PROPERTIES_FIELD, REQUIRED_FIELD, SCHEMA_FIELD, STYLE_FIELD,
};
use http::HeaderMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// A declared parameter, resolved and normalized with the spec defaults
/// applied: style per location, explode per style, `required` false,
/// `allowReserved` false.
#[derive(Debug)]
pub(crate) struct ParameterView {
    pub node: Arc<Value>,
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: ParameterStyle,
    pub explode: bool,
    pub allow_reserved: bool,
    pub schema: Option<Value>,
    pub content_type: Option<String>,
    /// Name-keyed keyword path used for `KeywordLocation`:
    /// `paths/<tpl>/<method>/parameters/<name>/schema`.
    pub keyword_path: JsonPath,
    /// Index-keyed pointer into the document, for line/column lookup.
    pub locator_pointer: String,
}

impl ParameterView {
    fn target(&self) -> ValueTarget {
        self.schema.as_ref().map(ValueTarget::of_schema).unwrap_or(ValueTarget::Scalar)
    }
}

/// Collects the declared parameters for one location, letting operation-level
/// declarations shadow path-level ones by (name, in). Order is declaration
/// order, path level first.
pub(crate) fn collect_parameters(
    ctx: &ValidationContext<'_>,
    path_item: &Value,
    operation: &Operation,
    location: ParameterLocation,
) -> Result<Vec<ParameterView>, ValidationError> {
    let mut views: Vec<ParameterView> = Vec::new();

    let levels = [
        (path_item.get(PARAMETERS_FIELD), false),
        (operation.data().get(PARAMETERS_FIELD), true),
    ];
    for (declared, operation_level) in levels {
        let Some(declared) = declared.and_then(|p| p.as_array()) else { continue };
        for (index, node) in declared.iter().enumerate() {
            let resolved = match ctx.traverser.resolve(node) {
                Ok(found) => found.to_arc(),
                Err(e) => {
                    return Err(ValidationError::internal(
                        "The specification could not be traversed",
                        format!("Failed to resolve a parameter reference: {}", e),
                    ));
                }
            };
            let Some(view) =
                build_view(ctx, resolved, operation, location, index, operation_level)?
            else {
                continue;
            };
            match views.iter_mut().find(|existing| existing.name == view.name) {
                Some(existing) if operation_level => *existing = view,
                Some(_) => {}
                None => views.push(view),
            }
        }
    }
    Ok(views)
}

fn build_view(
    ctx: &ValidationContext<'_>,
    node: Arc<Value>,
    operation: &Operation,
    wanted: ParameterLocation,
    index: usize,
    operation_level: bool,
) -> Result<Option<ParameterView>, ValidationError> {
    let Some(declared_in) = node.get(IN_FIELD).and_then(|v| v.as_str()) else {
        return Ok(None);
    };
    let Ok(location) = declared_in.parse::<ParameterLocation>() else {
        return Ok(None);
    };
    if location != wanted {
        return Ok(None);
    }
    let Some(name) = node.get(NAME_FIELD).and_then(|v| v.as_str()).map(str::to_string) else {
        return Ok(None);
    };

    let style = match node.get(STYLE_FIELD).and_then(|v| v.as_str()) {
        Some(raw) => raw.parse::<ParameterStyle>().map_err(|fault| {
            ValidationError::internal(
                format!("Parameter '{}' declares an unknown style", name),
                fault.to_string(),
            )
        })?,
        None => ParameterStyle::default_for(location),
    };
    let explode = node
        .get(EXPLODE_FIELD)
        .and_then(|v| v.as_bool())
        .unwrap_or_else(|| style.default_explode());
    let required = node.get(REQUIRED_FIELD).and_then(|v| v.as_bool()).unwrap_or(false);
    let allow_reserved =
        node.get(ALLOW_RESERVED_FIELD).and_then(|v| v.as_bool()).unwrap_or(false);

    // Exactly one of `schema` or `content` carries the value description;
    // `content` wraps the schema in a single media-type entry.
    let mut content_type = None;
    let mut schema_suffix = vec![SCHEMA_FIELD.to_string()];
    let schema = match node.get(SCHEMA_FIELD) {
        Some(schema) => Some(resolve_schema(ctx, schema)?),
        None => match node.get(CONTENT_FIELD).and_then(|c| c.as_object()) {
            Some(content) => match content.iter().next() {
                Some((media_type, media_node)) => {
                    content_type = Some(media_type.clone());
                    schema_suffix = vec![
                        CONTENT_FIELD.to_string(),
                        media_type.clone(),
                        SCHEMA_FIELD.to_string(),
                    ];
                    match media_node.get(SCHEMA_FIELD) {
                        Some(schema) => Some(resolve_schema(ctx, schema)?),
                        None => None,
                    }
                }
                None => None,
            },
            None => None,
        },
    };

    let mut keyword_path = operation.keyword_base();
    keyword_path.add(PARAMETERS_FIELD).add(&name);
    for segment in &schema_suffix {
        keyword_path.add(segment);
    }

    let mut locator_path = JsonPath::new();
    locator_path.add("paths").add(operation.template());
    if operation_level {
        locator_path.add(operation.method());
    }
    locator_path.add(PARAMETERS_FIELD).add(index.to_string());
    let locator_pointer = locator_path.pointer();

    Ok(Some(ParameterView {
        node,
        name,
        location,
        required,
        style,
        explode,
        allow_reserved,
        schema,
        content_type,
        keyword_path,
        locator_pointer,
    }))
}

fn resolve_schema(ctx: &ValidationContext<'_>, schema: &Value) -> Result<Value, ValidationError> {
    match ctx.traverser.resolve(schema) {
        Ok(found) => Ok(found.value().clone()),
        Err(e) => Err(ValidationError::internal(
            "The specification could not be traversed",
            format!("Failed to resolve a parameter schema reference: {}", e),
        )),
    }
}

pub(crate) struct ParameterValidator<'v> {
    ctx: &'v ValidationContext<'v>,
    operation: &'v Operation,
    path_item: &'v Value,
    request_path: &'v str,
}

impl<'v> ParameterValidator<'v> {
    pub(crate) fn new(
        ctx: &'v ValidationContext<'v>,
        operation: &'v Operation,
        path_item: &'v Value,
        request_path: &'v str,
    ) -> Self {
        Self { ctx, operation, path_item, request_path }
    }

    pub(crate) fn validate_query(
        &self,
        raw_query: Option<&str>,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        let entries = raw_query.map(parse_query).unwrap_or_default();
        let views = match collect_parameters(
            self.ctx,
            self.path_item,
            self.operation,
            ParameterLocation::Query,
        ) {
            Ok(views) => views,
            Err(e) => return ValidationReport::failure(e),
        };

        let mut report = ValidationReport::passing();
        for view in &views {
            if let Some(cancel) = cancel {
                if cancel.is_cancelled() {
                    report.push(self.stamp(ValidationError::aborted(), view));
                    return report;
                }
            }
            for error in self.check_query_parameter(view, &entries) {
                report.push(error);
            }
        }
        report
    }

    pub(crate) fn validate_headers(
        &self,
        headers: &HeaderMap,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        self.validate_simple_location(ParameterLocation::Header, cancel, |view| {
            headers
                .get(view.name.as_str())
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
    }

    pub(crate) fn validate_cookies(
        &self,
        headers: &HeaderMap,
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        let cookies = parse_cookie_header(headers);
        self.validate_simple_location(ParameterLocation::Cookie, cancel, |view| {
            // Cookie names match case-sensitively.
            cookies.iter().find(|(name, _)| *name == view.name).map(|(_, v)| v.clone())
        })
    }

    pub(crate) fn validate_path(
        &self,
        path_vars: &[(String, String)],
        cancel: Option<&CancelToken>,
    ) -> ValidationReport {
        self.validate_simple_location(ParameterLocation::Path, cancel, |view| {
            path_vars.iter().find(|(name, _)| *name == view.name).map(|(_, v)| v.clone())
        })
    }

    fn validate_simple_location(
        &self,
        location: ParameterLocation,
        cancel: Option<&CancelToken>,
        lookup: impl Fn(&ParameterView) -> Option<String>,
    ) -> ValidationReport {
        let views = match collect_parameters(self.ctx, self.path_item, self.operation, location) {
            Ok(views) => views,
            Err(e) => return ValidationReport::failure(e),
        };
        let mut report = ValidationReport::passing();
        for view in &views {
            if let Some(cancel) = cancel {
                if cancel.is_cancelled() {
                    report.push(self.stamp(ValidationError::aborted(), view));
                    return report;
                }
            }
            match lookup(view) {
                None => {
                    if view.required {
                        report.push(self.missing_error(view));
                    }
                }
                Some(raw) => {
                    for error in self.check_single_value(view, &raw) {
                        report.push(error);
                    }
                }
            }
        }
        report
    }

    /// The full state machine for one query parameter:
    /// locate, presence, style gate, reserved gate, typed validation.
    fn check_query_parameter(
        &self,
        view: &ParameterView,
        entries: &[QueryParam],
    ) -> Vec<ValidationError> {
        let matching: Vec<&QueryParam> =
            entries.iter().filter(|entry| entry.key == view.name).collect();

        if matching.is_empty() {
            if view.required {
                return vec![self.missing_error(view)];
            }
            return self.maybe_synthetic_object(view, entries);
        }

        // Style-consistency gate.
        let target = view.target();
        for entry in &matching {
            if let Err(fault) = check_style_consistency(view.style, view.explode, entry, target) {
                return vec![self.style_error(view, fault)];
            }
        }

        // Reserved-character gate. Matrix style is exempt, the style itself
        // is made of reserved characters.
        if !view.allow_reserved
            && view.style != ParameterStyle::Matrix
            && view.explode
        {
            for entry in &matching {
                for raw in &entry.values {
                    if codec::find_reserved_character(raw).is_some() {
                        let fault = StyleFault::IncorrectReservedValues {
                            name: view.name.clone(),
                            value: raw.clone(),
                        };
                        return vec![self.style_error(view, fault)];
                    }
                }
            }
        }

        if view.style == ParameterStyle::DeepObject {
            return self.check_deep_object(view, &matching);
        }

        let wire_values: Vec<String> =
            matching.iter().flat_map(|entry| entry.values.iter().cloned()).collect();
        self.check_typed(view, &wire_values, |explode, target| {
            let entry = merge_entries(&view.name, &matching);
            match view.style {
                ParameterStyle::Form => decode_form(&entry, explode, target),
                ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited => {
                    decode_delimited(&entry, view.style, explode, target)
                }
                _ => decode_form(&entry, explode, target),
            }
        })
    }

    fn check_deep_object(
        &self,
        view: &ParameterView,
        matching: &[&QueryParam],
    ) -> Vec<ValidationError> {
        let schema = view.schema.clone().unwrap_or_else(|| json!({}));
        let decoded = decode_deep_object(matching, &schema);
        self.schema_errors_for(view, &decoded)
    }

    /// Path, header, and cookie parameters carry exactly one raw value.
    fn check_single_value(&self, view: &ParameterView, raw: &str) -> Vec<ValidationError> {
        let wire_values = [raw.to_string()];
        self.check_typed(view, &wire_values, |explode, target| {
            match view.style {
                ParameterStyle::Matrix => decode_matrix(raw, &view.name, explode, target),
                ParameterStyle::Label => decode_label(raw, explode, target),
                _ => decode_simple(raw, explode, target),
            }
        })
    }

    /// Steps 4-7 of the chain: schema-directed type checks, the explode
    /// hint, object decoding, and the enum gate. The first failing step
    /// settles the parameter.
    fn check_typed(
        &self,
        view: &ParameterView,
        wire_values: &[String],
        decode: impl Fn(bool, ValueTarget) -> Value,
    ) -> Vec<ValidationError> {
        let Some(schema) = view.schema.as_ref() else {
            // Nothing to validate against; content without schema accepts
            // anything.
            return Vec::new();
        };

        // Content-wrapped values parse as their media type first.
        if let Some(content_type) = &view.content_type {
            if content_type.contains("json") {
                let raw = wire_values.first().map(String::as_str).unwrap_or("");
                return match serde_json::from_str::<Value>(raw) {
                    Ok(instance) => self.schema_errors_for(view, &instance),
                    Err(e) => vec![self.stamp(
                        ValidationError::new(
                            ValidationType::Parameter,
                            self.sub_type(view),
                            format!(
                                "{} parameter '{}' is not valid JSON",
                                view.location.label(),
                                view.name
                            ),
                            format!("The parameter value failed to parse: {}", e),
                        ),
                        view,
                    )],
                };
            }
        }

        let declared = PrimitiveType::declared_types(schema);

        let mut errors = Vec::new();
        let mut failing_kinds = 0usize;
        for kind in &declared {
            let seen = errors.len();
            match kind {
                PrimitiveType::Integer | PrimitiveType::Number => {
                    for raw in wire_values {
                        if raw.parse::<f64>().is_err() {
                            errors.push(self.type_error(view, kind, raw));
                        }
                    }
                }
                PrimitiveType::Boolean => {
                    for raw in wire_values {
                        if PrimitiveType::Boolean.parse_token(raw).is_err() {
                            errors.push(self.type_error(view, kind, raw));
                        }
                    }
                }
                PrimitiveType::Array => {
                    if let Some(error) = self.explode_hint(view, wire_values) {
                        errors.push(error);
                    } else {
                        let decoded = decode(view.explode, ValueTarget::Array);
                        errors.extend(self.item_type_errors(view, schema, &decoded));
                        errors.extend(self.schema_errors_for(view, &decoded));
                    }
                }
                PrimitiveType::Object => {
                    let decoded = decode(view.explode, ValueTarget::Object);
                    errors.extend(self.schema_errors_for(view, &decoded));
                }
                PrimitiveType::String | PrimitiveType::Null => {}
            }
            if errors.len() > seen {
                failing_kinds += 1;
            }
        }

        // When several types are declared, a value acceptable under any one
        // of them passes the type stage; a type failure settles the
        // parameter before the enum or constraints are consulted.
        if !errors.is_empty() {
            if declared.len() > 1 && failing_kinds < declared.len() {
                errors.clear();
            } else {
                return errors;
            }
        }

        // Enum gate, once the value has a valid type: a value outside the
        // enumeration makes the remaining checks meaningless noise.
        if let Some(error) = self.enum_gate(view, wire_values) {
            return vec![error];
        }

        // Constraint validation through the compiled schema, on the decoded
        // value (scalar values validate as their cast form; strings with
        // constraints validate as raw strings).
        if has_constraints(schema) {
            let instance = if declared.contains(&PrimitiveType::Array)
                || declared.contains(&PrimitiveType::Object)
            {
                decode(view.explode, view.target())
            } else if declared.contains(&PrimitiveType::String) || declared.is_empty() {
                json!(wire_values.first().map(String::as_str).unwrap_or(""))
            } else {
                let raw = wire_values.first().map(String::as_str).unwrap_or("");
                declared
                    .first()
                    .and_then(|kind| kind.parse_token(raw).ok())
                    .unwrap_or_else(|| json!(raw))
            };
            return self.schema_errors_for(view, &instance);
        }
        Vec::new()
    }

    /// Exploded arrays expect one wire value per item. Multiple wire values
    /// still carrying the style delimiter mean the client mixed both forms.
    fn explode_hint(&self, view: &ParameterView, wire_values: &[String]) -> Option<ValidationError> {
        if !view.explode || wire_values.len() < 2 {
            return None;
        }
        let delimiter = view.style.delimiter();
        let offending = wire_values.iter().find(|raw| raw.contains(delimiter))?;
        let values: Vec<&str> = wire_values
            .iter()
            .flat_map(|raw| raw.split(delimiter))
            .collect();
        let hint = match view.style {
            ParameterStyle::SpaceDelimited => {
                codec::collapse_into_space_delimited(&view.name, &values)
            }
            ParameterStyle::PipeDelimited => {
                codec::collapse_into_pipe_delimited(&view.name, &values)
            }
            _ => codec::collapse_into_form(&view.name, &values),
        };
        let error = ValidationError::new(
            ValidationType::Parameter,
            self.sub_type(view),
            format!(
                "{} parameter '{}' mixes exploded and delimited encodings",
                view.location.label(),
                view.name
            ),
            format!(
                "The parameter is declared with explode set, yet the value '{}' still \
                 contains the '{}' delimiter",
                offending, delimiter
            ),
        )
        .how_to_fix(format!("Encode each item separately: {}", hint));
        Some(self.stamp_at(error, view, EXPLODE_FIELD))
    }

    fn item_type_errors(
        &self,
        view: &ParameterView,
        schema: &Value,
        decoded: &Value,
    ) -> Vec<ValidationError> {
        let Some(items) = decoded.as_array() else { return Vec::new() };
        let item_types = schema
            .get(ITEMS_FIELD)
            .map(PrimitiveType::declared_types)
            .unwrap_or_default();
        let mut errors = Vec::new();
        for kind in item_types {
            for item in items {
                let conforms = match kind {
                    PrimitiveType::Integer => item.is_i64() || item.is_u64(),
                    PrimitiveType::Number => item.is_number(),
                    PrimitiveType::Boolean => item.is_boolean(),
                    PrimitiveType::String => item.is_string(),
                    _ => true,
                };
                if !conforms {
                    let raw = match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    errors.push(self.type_error(view, &kind, &raw));
                }
            }
        }
        errors
    }

    fn enum_gate(&self, view: &ParameterView, wire_values: &[String]) -> Option<ValidationError> {
        let schema = view.schema.as_ref()?;
        let allowed = schema.get(ENUM_FIELD)?.as_array()?;
        let offending = wire_values.iter().find(|raw| {
            !allowed.iter().any(|candidate| match candidate {
                Value::String(s) => s == *raw,
                other => *other == crate::types::primitive::cast(raw),
            })
        })?;
        let rendered = allowed
            .iter()
            .map(|candidate| match candidate {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let error = ValidationError::new(
            ValidationType::Parameter,
            self.sub_type(view),
            format!(
                "{} parameter '{}' does not match allowed values",
                view.location.label(),
                view.name
            ),
            format!(
                "The {} parameter '{}' has a value of '{}' which is not one of the \
                 allowed values",
                view.location, view.name, offending
            ),
        )
        .how_to_fix(format!("Instead of '{}', use one of the allowed values: '{}'", offending, rendered));
        Some(self.stamp_at(error, view, ENUM_FIELD))
    }

    /// Assembles a synthetic object for an absent, non-required, form-encoded
    /// object parameter from the present query keys. Only attempted when at
    /// least one present key matches a declared property, so parameters with
    /// genuinely no input stay untouched.
    fn maybe_synthetic_object(
        &self,
        view: &ParameterView,
        entries: &[QueryParam],
    ) -> Vec<ValidationError> {
        let Some(schema) = view.schema.as_ref() else { return Vec::new() };
        if view.style != ParameterStyle::Form || ValueTarget::of_schema(schema) != ValueTarget::Object
        {
            return Vec::new();
        }
        let Some(properties) = schema.get(PROPERTIES_FIELD).and_then(|p| p.as_object()) else {
            return Vec::new();
        };
        let mut assembled = Map::new();
        for entry in entries {
            if entry.property.is_none() && properties.contains_key(&entry.key) {
                if let Some(raw) = entry.values.first() {
                    assembled
                        .insert(entry.key.clone(), crate::types::primitive::cast(raw));
                }
            }
        }
        if assembled.is_empty() {
            return Vec::new();
        }
        self.schema_errors_for(view, &Value::Object(assembled))
    }

    /// Compiles the parameter schema and translates engine failures.
    fn schema_errors_for(&self, view: &ParameterView, instance: &Value) -> Vec<ValidationError> {
        let Some(schema) = view.schema.as_ref() else { return Vec::new() };
        let compiled = match self.ctx.compiler.compile_inline(schema) {
            Ok(compiled) => compiled,
            Err(e) => {
                return vec![ValidationError::internal(
                    format!("The schema for parameter '{}' does not compile", view.name),
                    e.to_string(),
                )];
            }
        };
        let mut failures =
            engine_failures(&compiled, instance, &view.keyword_path, self.ctx.locator);
        if failures.is_empty() {
            return Vec::new();
        }
        let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        for failure in &mut failures {
            failure.reference_schema = Some(rendered.clone());
        }
        let reason = failures
            .first()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "schema validation failed".to_string());
        let error = ValidationError::new(
            ValidationType::Parameter,
            self.sub_type(view),
            format!(
                "{} parameter '{}' failed schema validation",
                view.location.label(),
                view.name
            ),
            reason,
        )
        .with_schema_failures(failures);
        vec![self.stamp(error, view)]
    }

    fn missing_error(&self, view: &ParameterView) -> ValidationError {
        let error = ValidationError::new(
            ValidationType::Parameter,
            self.sub_type(view),
            format!("{} parameter '{}' is missing", view.location.label(), view.name),
            format!(
                "The {} parameter '{}' is defined as being required, yet is missing \
                 from the request",
                view.location, view.name
            ),
        )
        .how_to_fix(format!(
            "Add the parameter '{}' to the request {}",
            view.name, view.location
        ));
        self.stamp_at(error, view, REQUIRED_FIELD)
    }

    fn style_error(&self, view: &ParameterView, fault: StyleFault) -> ValidationError {
        let error = ValidationError::new(
            ValidationType::Parameter,
            self.sub_type(view),
            format!(
                "{} parameter '{}' is not encoded correctly",
                view.location.label(),
                view.name
            ),
            format!("{}: {}", fault.signal(), fault),
        );
        self.stamp_at(error, view, STYLE_FIELD)
    }

    fn type_error(
        &self,
        view: &ParameterView,
        kind: &PrimitiveType,
        raw: &str,
    ) -> ValidationError {
        let noun = match kind {
            PrimitiveType::Boolean => "true/false value",
            PrimitiveType::Integer => "integer",
            _ => "number",
        };
        let error = ValidationError::new(
            ValidationType::Parameter,
            self.sub_type(view),
            format!(
                "{} parameter '{}' is not a valid {}",
                view.location.label(),
                view.name,
                noun
            ),
            format!(
                "The {} parameter '{}' has a value of '{}' which is not a valid {}",
                view.location, view.name, raw, noun
            ),
        )
        .how_to_fix(format!("Provide a {} for the parameter '{}'", noun, view.name));
        self.stamp_at(error, view, "type")
    }

    fn sub_type(&self, view: &ParameterView) -> ValidationSubType {
        match view.location {
            ParameterLocation::Query => ValidationSubType::Query,
            ParameterLocation::Path => ValidationSubType::Path,
            ParameterLocation::Header => ValidationSubType::Header,
            ParameterLocation::Cookie => ValidationSubType::Cookie,
        }
    }

    /// Stamps request/spec provenance, pointing the keyword location at the
    /// name-keyed pointer for `keyword` and the line/column at the most
    /// specific real node available.
    fn stamp_at(
        &self,
        error: ValidationError,
        view: &ParameterView,
        keyword: &str,
    ) -> ValidationError {
        let mut keyword_path = view.keyword_path.clone();
        keyword_path.add(keyword);
        let mut error = self.stamp(error, view).at_keyword(keyword_path.pointer());

        // Line/column lookup walks the real index-keyed pointer, preferring
        // the schema keyword, then the parameter keyword, then the parameter
        // node itself.
        let candidates = [
            format!("{}/schema/{}", view.locator_pointer, keyword),
            format!("{}/{}", view.locator_pointer, keyword),
            view.locator_pointer.clone(),
        ];
        for pointer in candidates {
            if let Some(at) = self.ctx.locator.key(&pointer) {
                return error.locate(at.line, at.col);
            }
        }
        error.spec_line = 0;
        error.spec_col = 0;
        error
    }

    fn stamp(&self, error: ValidationError, view: &ParameterView) -> ValidationError {
        let located = self
            .ctx
            .locator
            .key(&view.locator_pointer)
            .unwrap_or_default();
        let mut error = error
            .on_request(self.request_path, self.operation.method())
            .for_spec_path(self.operation.template())
            .for_parameter(&view.name)
            .with_context(Arc::clone(&view.node));
        if error.keyword_location.is_none() {
            let pointer = error
                .schema_validation_errors
                .first()
                .map(|f| f.keyword_location.clone())
                .unwrap_or_else(|| view.keyword_path.pointer());
            error = error.at_keyword(pointer);
        }
        if error.spec_line == 0 {
            error = error.locate(located.line, located.col);
        }
        error
    }
}

/// Flattens several wire entries for the same key into one [`QueryParam`].
fn merge_entries(name: &str, entries: &[&QueryParam]) -> QueryParam {
    QueryParam {
        key: name.to_string(),
        property: None,
        values: entries.iter().flat_map(|entry| entry.values.iter().cloned()).collect(),
    }
}

/// Splits every `Cookie` header into (name, value) pairs, preserving order.
pub(crate) fn parse_cookie_header(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut cookies = Vec::new();
    for header in headers.get_all(http::header::COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((name, value)) => cookies.push((name.to_string(), value.to_string())),
                None => cookies.push((pair.to_string(), String::new())),
            }
        }
    }
    cookies
}

fn has_constraints(schema: &Value) -> bool {
    const CONSTRAINT_KEYWORDS: [&str; 13] = [
        "enum",
        "pattern",
        "minLength",
        "maxLength",
        "format",
        "minimum",
        "maximum",
        "exclusiveMinimum",
        "exclusiveMaximum",
        "multipleOf",
        "minItems",
        "maxItems",
        "uniqueItems",
    ];
    schema
        .as_object()
        .is_some_and(|map| CONSTRAINT_KEYWORDS.iter().any(|k| map.contains_key(*k)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::COOKIE, "a=1; b=two; flag".parse().unwrap());
        let cookies = parse_cookie_header(&headers);
        assert_eq!(cookies, vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "two".to_string()),
            ("flag".to_string(), String::new()),
        ]);
    }

    #[test]
    fn test_has_constraints() {
        assert!(has_constraints(&json!({ "type": "string", "minLength": 1 })));
        assert!(has_constraints(&json!({ "enum": ["a"] })));
        assert!(!has_constraints(&json!({ "type": "string" })));
    }

    #[test]
    fn test_merge_entries_flattens_in_order() {
        let first = QueryParam::new("id", vec!["1".into(), "2".into()]);
        let second = QueryParam::new("id", vec!["3".into()]);
        let merged = merge_entries("id", &[&first, &second]);
        assert_eq!(merged.values, vec!["1", "2", "3"]);
    }
}
