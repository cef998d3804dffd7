//! Media-type dispatch for request and response bodies. Every branch funnels
//! into the same schema kernel: reconstruct a typed value from the wire
//! bytes, compile the declared schema, translate engine failures.

use crate::codec::media_type::MediaType;
use crate::codec::multipart::parse_multipart;
use crate::codec::xml::{element_to_value, parse_xml};
use crate::codec::{self, parse_query};
use crate::error::{ValidationError, ValidationReport, ValidationSubType, ValidationType};
use crate::types::json_path::JsonPath;
use crate::types::operation::Operation;
use crate::types::primitive::cast;
use crate::validator::{engine_failures, ValidationContext};
use crate::{ALLOW_RESERVED_FIELD, ENCODING_FIELD, SCHEMA_FIELD, XML_FIELD};
use bytes::Bytes;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyDirection {
    Request,
    Response,
}

impl BodyDirection {
    fn body_type(&self) -> (ValidationType, ValidationSubType) {
        match self {
            BodyDirection::Request => (ValidationType::Request, ValidationSubType::Body),
            BodyDirection::Response => (ValidationType::Response, ValidationSubType::Body),
        }
    }

    fn content_type_label(&self) -> &'static str {
        match self {
            BodyDirection::Request => "RequestContentTypeNotFound",
            BodyDirection::Response => "ResponseContentTypeNotFound",
        }
    }
}

pub(crate) struct BodyValidator<'v> {
    ctx: &'v ValidationContext<'v>,
    operation: &'v Operation,
    request_path: &'v str,
    direction: BodyDirection,
}

impl<'v> BodyValidator<'v> {
    pub(crate) fn new(
        ctx: &'v ValidationContext<'v>,
        operation: &'v Operation,
        request_path: &'v str,
        direction: BodyDirection,
    ) -> Self {
        Self { ctx, operation, request_path, direction }
    }

    /// Validates a body against a `content` mapping (from `requestBody` or a
    /// response entry). `content_path` points at the mapping inside the spec.
    pub(crate) fn validate_against_content(
        &self,
        content: &Value,
        content_path: &JsonPath,
        content_type_header: Option<&str>,
        body: Option<&Bytes>,
        body_required: bool,
    ) -> ValidationReport {
        let Some(content_map) = content.as_object() else {
            return ValidationReport::failure(ValidationError::internal(
                "The content mapping is not an object",
                format!("Found {} where a media-type mapping was expected", content),
            ));
        };

        let media = content_type_header.and_then(MediaType::parse);
        let Some(media) = media else {
            if body.is_some() || body_required {
                return ValidationReport::failure(self.content_type_error(
                    content_map,
                    content_path,
                    "<none>",
                ));
            }
            return ValidationReport::passing();
        };

        // Exact media-type negotiation against the declared entries,
        // comparing essences so parameters on either side are ignored.
        let declared = content_map.iter().find(|(declared_type, _)| {
            MediaType::parse(declared_type)
                .map(|d| d.essence == media.essence)
                .unwrap_or(false)
        });
        let Some((declared_type, media_node)) = declared else {
            return ValidationReport::failure(self.content_type_error(
                content_map,
                content_path,
                &media.essence,
            ));
        };

        let Some(body) = body else {
            if body_required {
                let (vtype, vsub) = self.direction.body_type();
                return ValidationReport::failure(self.stamp(
                    ValidationError::new(
                        vtype,
                        vsub,
                        "The body is missing",
                        "The body is defined as being required, yet no body was provided",
                    ),
                    content_path,
                ));
            }
            return ValidationReport::passing();
        };

        let mut schema_path = content_path.clone();
        schema_path.add(declared_type).add(SCHEMA_FIELD);
        let schema = media_node.get(SCHEMA_FIELD);

        if media.is_json() {
            self.validate_json(body, &schema_path, schema)
        } else if media.is_form_urlencoded() {
            self.validate_form_urlencoded(body, media_node, &schema_path, schema)
        } else if media.is_multipart_form() {
            self.validate_multipart(body, &media, &schema_path, schema)
        } else if media.is_xml() {
            self.validate_xml(body, &schema_path, schema)
        } else {
            // Unstructured media: validate the raw text when a schema exists.
            match schema {
                Some(schema) if !schema.is_null() => {
                    let text = String::from_utf8_lossy(body).to_string();
                    self.schema_report(&json!(text), &schema_path)
                }
                _ => ValidationReport::passing(),
            }
        }
    }

    fn validate_json(
        &self,
        body: &Bytes,
        schema_path: &JsonPath,
        schema: Option<&Value>,
    ) -> ValidationReport {
        let instance: Value = match serde_json::from_slice(body) {
            Ok(instance) => instance,
            Err(e) => {
                let (vtype, vsub) = self.direction.body_type();
                return ValidationReport::failure(self.stamp(
                    ValidationError::new(
                        vtype,
                        vsub,
                        "The body is not valid JSON",
                        format!("The body failed to parse: {}", e),
                    ),
                    schema_path,
                ));
            }
        };
        if schema.is_none() {
            return ValidationReport::passing();
        }
        self.schema_report(&instance, schema_path)
    }

    fn validate_form_urlencoded(
        &self,
        body: &Bytes,
        media_node: &Value,
        schema_path: &JsonPath,
        schema: Option<&Value>,
    ) -> ValidationReport {
        let text = String::from_utf8_lossy(body).to_string();
        let entries = parse_query(&text);
        let encodings = media_node.get(ENCODING_FIELD).and_then(|e| e.as_object());

        let mut report = ValidationReport::passing();
        let mut assembled = Map::new();
        for entry in &entries {
            let raw = entry.values.first().cloned().unwrap_or_default();
            let encoding = encodings.and_then(|map| map.get(&entry.key));

            let allow_reserved = encoding
                .and_then(|enc| enc.get(ALLOW_RESERVED_FIELD))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if !allow_reserved {
                if let Some(reserved) = codec::find_reserved_character(&raw) {
                    report.push(self.stamp(
                        ValidationError::new(
                            ValidationType::Urlencoded,
                            ValidationSubType::ReservedValues,
                            format!("The form property '{}' contains reserved values", entry.key),
                            format!(
                                "The value '{}' contains the reserved character '{}' and \
                                 allowReserved is not set",
                                raw, reserved
                            ),
                        ),
                        schema_path,
                    ));
                    continue;
                }
            }

            // An encoding entry may declare an inner content type, typically
            // nested JSON.
            let declared_encoding =
                encoding.and_then(|enc| enc.get("contentType")).and_then(|v| v.as_str());
            let value = match declared_encoding {
                Some(content_type) if content_type.contains("json") => {
                    match serde_json::from_str::<Value>(&raw) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            report.push(self.stamp(
                                ValidationError::new(
                                    ValidationType::Urlencoded,
                                    ValidationSubType::InvalidTypeEncoding,
                                    format!(
                                        "The form property '{}' is not encoded as '{}'",
                                        entry.key, content_type
                                    ),
                                    format!("The value failed to parse: {}", e),
                                ),
                                schema_path,
                            ));
                            continue;
                        }
                    }
                }
                _ => {
                    if entry.values.len() > 1 {
                        Value::Array(entry.values.iter().map(|v| cast(v)).collect())
                    } else {
                        cast(&raw)
                    }
                }
            };
            assembled.insert(entry.key.clone(), value);
        }

        if schema.is_some() {
            let mut schema_report = self.schema_report(&Value::Object(assembled), schema_path);
            for error in &mut schema_report.errors {
                error.validation_type = ValidationType::Urlencoded;
                error.validation_sub_type = Some(ValidationSubType::Schema);
            }
            report.merge(schema_report);
        }
        report
    }

    fn validate_multipart(
        &self,
        body: &Bytes,
        media: &MediaType,
        schema_path: &JsonPath,
        schema: Option<&Value>,
    ) -> ValidationReport {
        let (vtype, vsub) = self.direction.body_type();
        let Some(boundary) = media.boundary.as_deref() else {
            return ValidationReport::failure(self.stamp(
                ValidationError::new(
                    vtype,
                    vsub,
                    "The multipart body has no boundary",
                    "The Content-Type header does not carry the boundary parameter",
                ),
                schema_path,
            ));
        };
        let parts = match parse_multipart(body, boundary) {
            Ok(parts) => parts,
            Err(e) => {
                return ValidationReport::failure(self.stamp(
                    ValidationError::new(
                        vtype,
                        vsub,
                        "The multipart body is malformed",
                        e.to_string(),
                    ),
                    schema_path,
                ));
            }
        };

        let mut report = ValidationReport::passing();
        let mut assembled = Map::new();
        for part in parts {
            let value = if part.is_file() {
                // File parts validate by presence; content stays opaque.
                json!(part.text())
            } else if part
                .content_type
                .as_deref()
                .and_then(MediaType::parse)
                .is_some_and(|part_type| part_type.is_json())
            {
                match serde_json::from_slice::<Value>(&part.data) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        report.push(self.stamp(
                            ValidationError::new(
                                vtype,
                                vsub,
                                format!("The multipart part '{}' is not valid JSON", part.name),
                                format!("The part failed to parse: {}", e),
                            ),
                            schema_path,
                        ));
                        continue;
                    }
                }
            } else {
                cast(&part.text())
            };
            match assembled.get_mut(&part.name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    assembled.insert(part.name.clone(), value);
                }
            }
        }

        if schema.is_some() {
            report.merge(self.schema_report(&Value::Object(assembled), schema_path));
        }
        report
    }

    fn validate_xml(
        &self,
        body: &Bytes,
        schema_path: &JsonPath,
        schema: Option<&Value>,
    ) -> ValidationReport {
        let text = String::from_utf8_lossy(body).to_string();
        let root = match parse_xml(&text) {
            Ok(root) => root,
            Err(e) => {
                return ValidationReport::failure(self.stamp(
                    ValidationError::new(
                        ValidationType::Xml,
                        ValidationSubType::Schema,
                        "The body is not well-formed XML",
                        e.to_string(),
                    ),
                    schema_path,
                ));
            }
        };

        let mut report = ValidationReport::passing();
        // `xml` metadata on the schema pins the expected root name, prefix
        // and namespace.
        if let Some(xml_meta) = schema.and_then(|s| s.get(XML_FIELD)) {
            if let Some(expected_name) = xml_meta.get("name").and_then(|v| v.as_str()) {
                if root.name != expected_name {
                    report.push(self.stamp(
                        ValidationError::new(
                            ValidationType::Xml,
                            ValidationSubType::Schema,
                            format!("The XML root element should be named '{}'", expected_name),
                            format!("Found root element '{}'", root.name),
                        ),
                        schema_path,
                    ));
                }
            }
            if let Some(expected_prefix) = xml_meta.get("prefix").and_then(|v| v.as_str()) {
                if root.prefix.as_deref() != Some(expected_prefix) {
                    report.push(self.stamp(
                        ValidationError::new(
                            ValidationType::Xml,
                            ValidationSubType::Prefix,
                            format!("The XML root element must use the prefix '{}'", expected_prefix),
                            format!(
                                "Found prefix '{}'",
                                root.prefix.as_deref().unwrap_or("<none>")
                            ),
                        ),
                        schema_path,
                    ));
                }
            }
            if let Some(expected_ns) = xml_meta.get("namespace").and_then(|v| v.as_str()) {
                let declared = root.declared_namespace(root.prefix.as_deref());
                if declared != Some(expected_ns) {
                    report.push(self.stamp(
                        ValidationError::new(
                            ValidationType::Xml,
                            ValidationSubType::Namespace,
                            format!("The XML root element must declare the namespace '{}'", expected_ns),
                            format!("Found namespace '{}'", declared.unwrap_or("<none>")),
                        ),
                        schema_path,
                    ));
                }
            }
        }

        if schema.is_some() {
            let instance = element_to_value(&root);
            let mut schema_report = self.schema_report(&instance, schema_path);
            for error in &mut schema_report.errors {
                error.validation_type = ValidationType::Xml;
                error.validation_sub_type = Some(ValidationSubType::Schema);
            }
            report.merge(schema_report);
        }
        report
    }

    /// Compiles the schema at `schema_path` against the live document and
    /// translates engine failures into one located error.
    fn schema_report(&self, instance: &Value, schema_path: &JsonPath) -> ValidationReport {
        let compiled = match self.ctx.compiler.compile_pointer(schema_path) {
            Ok(compiled) => compiled,
            Err(e) => {
                return ValidationReport::failure(ValidationError::internal(
                    "The body schema does not compile",
                    e.to_string(),
                ));
            }
        };
        let mut failures = engine_failures(&compiled, instance, schema_path, self.ctx.locator);
        if failures.is_empty() {
            return ValidationReport::passing();
        }
        if let Some(schema) = self.ctx.traverser.specification().pointer(&schema_path.pointer()) {
            let rendered =
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
            for failure in &mut failures {
                failure.reference_schema = Some(rendered.clone());
            }
        }
        let (vtype, vsub) = self.direction.body_type();
        let reason = failures
            .first()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "schema validation failed".to_string());
        ValidationReport::failure(
            self.stamp(
                ValidationError::new(vtype, vsub, "The body failed schema validation", reason)
                    .with_schema_failures(failures),
                schema_path,
            ),
        )
    }

    fn content_type_error(
        &self,
        content_map: &Map<String, Value>,
        content_path: &JsonPath,
        observed: &str,
    ) -> ValidationError {
        let declared: Vec<&str> = content_map.keys().map(String::as_str).collect();
        let (vtype, _) = self.direction.body_type();
        self.stamp(
            ValidationError::new(
                vtype,
                ValidationSubType::ContentType,
                format!("The content type '{}' is not declared", observed),
                format!(
                    "{}: the media type '{}' has no entry in the content mapping",
                    self.direction.content_type_label(),
                    observed
                ),
            )
            .how_to_fix(format!("Use one of the declared media types: '{}'", declared.join(", "))),
            content_path,
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
