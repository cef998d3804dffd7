//! Compilation of specification schemas into re-entrant engine validators,
//! with the OpenAPI-dialect preprocessing the raw engine does not know about:
//! the 3.0 `nullable` rewrite, the 3.1 `nullable` rejection, and the opt-in
//! scalar coercion that admits stringly-typed primitives.

use crate::types::json_path::JsonPath;
use crate::types::version::OpenApiVersion;
use crate::{NULLABLE_FIELD, REF_FIELD, TYPE_FIELD};
use dashmap::DashMap;
use jsonschema::paths::{LazyLocation, Location};
use jsonschema::{
    Keyword, PatternOptions, Resource, ValidationError as EngineError, ValidationOptions,
    Validator as EngineValidator,
};
use serde_json::{json, Map, Value};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Anchor under which the whole document is registered with the engine, so
/// compiled schemas can `$ref` straight into the live specification.
pub(crate) const ROOT_ID: &str = "@@root";

const BOOLEAN_TOKEN_PATTERN: &str = "^(true|false|1|0)$";
const INTEGER_TOKEN_PATTERN: &str = "^-?[0-9]+$";
const NUMBER_TOKEN_PATTERN: &str = "^-?[0-9]+(\\.[0-9]+)?([eE][+-]?[0-9]+)?$";

/// Keys whose values are data, not schemas; the preprocessing walks do not
/// descend into them.
const OPAQUE_KEYS: [&str; 5] = ["enum", "const", "example", "examples", "default"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegexEngine {
    /// ECMA-compatible engine with lookaround and backreferences.
    #[default]
    Ecma,
    /// Linear-time RE2-like engine.
    Re2,
}

pub type FormatValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Immutable compiler configuration, built once at validator construction and
/// shared by every compiled schema.
#[derive(Clone, Default)]
pub struct SchemaOptions {
    pub regex_engine: RegexEngine,
    pub format_assertions: bool,
    pub content_assertions: bool,
    pub formats: Vec<(String, FormatValidator)>,
    pub openapi_mode: bool,
    pub scalar_coercion: bool,
}

impl std::fmt::Debug for SchemaOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaOptions")
            .field("regex_engine", &self.regex_engine)
            .field("format_assertions", &self.format_assertions)
            .field("content_assertions", &self.content_assertions)
            .field("formats", &self.formats.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("openapi_mode", &self.openapi_mode)
            .field("scalar_coercion", &self.scalar_coercion)
            .finish()
    }
}

#[derive(Debug)]
pub enum CompileError {
    MalformedSchema(String),
    NullableNotSupported(String),
    EngineRejected(String),
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::MalformedSchema(msg) => write!(f, "Malformed schema: {}", msg),
            CompileError::NullableNotSupported(pointer) => write!(
                f,
                "The `nullable` keyword is not supported in OpenAPI 3.1+ (found at '{}')",
                pointer
            ),
            CompileError::EngineRejected(msg) => {
                write!(f, "The schema engine rejected the schema: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Wraps the JSON Schema engine for one specification document.
///
/// Construction preprocesses the document once and registers it as an engine
/// resource; compilation is lazy per schema node and memoized, and the
/// resulting handles are safe for concurrent `validate` calls.
#[derive(Debug)]
pub struct SchemaCompiler {
    engine_options: ValidationOptions,
    compiled: DashMap<String, Arc<EngineValidator>>,
    version: OpenApiVersion,
    options: SchemaOptions,
}

impl SchemaCompiler {
    pub fn new(
        document: &Value,
        version: OpenApiVersion,
        options: SchemaOptions,
    ) -> Result<Self, CompileError> {
        let mut prepared = document.clone();
        preprocess(&mut prepared, version, &options, &mut String::new())?;
        prepared["$id"] = json!(ROOT_ID);

        let resource = Resource::from_contents(prepared)
            .map_err(|e| CompileError::MalformedSchema(e.to_string()))?;

        let mut engine_options = EngineValidator::options()
            .with_draft(version.get_draft())
            .with_resource("@@inner", resource)
            .should_validate_formats(options.format_assertions);

        engine_options = match options.regex_engine {
            RegexEngine::Ecma => engine_options.with_pattern_options(PatternOptions::fancy_regex()),
            RegexEngine::Re2 => engine_options.with_pattern_options(PatternOptions::regex()),
        };

        for (name, validator) in &options.formats {
            let validator = Arc::clone(validator);
            engine_options =
                engine_options.with_format(name.clone(), move |value| validator(value));
        }

        if options.content_assertions {
            engine_options = engine_options
                .with_keyword("contentEncoding", content_encoding_keyword)
                .with_keyword("contentMediaType", content_media_type_keyword);
        }

        Ok(Self {
            engine_options,
            compiled: DashMap::new(),
            version,
            options,
        })
    }

    pub fn version(&self) -> OpenApiVersion {
        self.version
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Compiles the schema node at `path` inside the registered document.
    ///
    /// Handles are cached by pointer; racing compilations of the same node
    /// both produce equivalent validators, so last-write-wins is safe.
    pub fn compile_pointer(&self, path: &JsonPath) -> Result<Arc<EngineValidator>, CompileError> {
        let key = path.format_path();
        if let Some(hit) = self.compiled.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let schema = json!({ REF_FIELD: format!("{}#/{}", ROOT_ID, key) });
        let validator = self
            .engine_options
            .build(&schema)
            .map_err(|e| CompileError::EngineRejected(e.to_string()))?;
        let validator = Arc::new(validator);
        self.compiled.insert(key, Arc::clone(&validator));
        Ok(validator)
    }

    /// Compiles a standalone schema, preprocessing it the same way the
    /// document was. Used for content-wrapped parameters and for synthetic
    /// constraint schemas. Cached by the schema's serialized form, so
    /// repeated compilations of the same bytes share one handle.
    pub fn compile_inline(&self, schema: &Value) -> Result<Arc<EngineValidator>, CompileError> {
        let mut prepared = schema.clone();
        preprocess(&mut prepared, self.version, &self.options, &mut String::new())?;
        // Document-local references must resolve against the registered
        // document, not the standalone schema.
        anchor_local_refs(&mut prepared);
        let key = format!("inline:{}", prepared);
        if let Some(hit) = self.compiled.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let validator = self
            .engine_options
            .build(&prepared)
            .map_err(|e| CompileError::EngineRejected(e.to_string()))?;
        let validator = Arc::new(validator);
        self.compiled.insert(key, Arc::clone(&validator));
        Ok(validator)
    }
}

/// Version-aware schema preprocessing, applied to every object node.
///
/// `pointer` tracks the position for diagnostics. Data-carrying keys
/// (`enum`, `example`, …) are left untouched.
fn preprocess(
    node: &mut Value,
    version: OpenApiVersion,
    options: &SchemaOptions,
    pointer: &mut String,
) -> Result<(), CompileError> {
    match node {
        Value::Object(map) => {
            if options.openapi_mode {
                apply_nullable(map, version, pointer)?;
            }
            if options.scalar_coercion {
                apply_scalar_coercion(map);
            }
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                if OPAQUE_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let saved = pointer.len();
                pointer.push('/');
                pointer.push_str(&key);
                if let Some(child) = map.get_mut(&key) {
                    preprocess(child, version, options, pointer)?;
                }
                pointer.truncate(saved);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                let saved = pointer.len();
                pointer.push('/');
                pointer.push_str(&index.to_string());
                preprocess(item, version, options, pointer)?;
                pointer.truncate(saved);
            }
        }
        _ => {}
    }
    Ok(())
}

/// The 3.0 `nullable` rewrite and the 3.1 `nullable` rejection.
fn apply_nullable(
    map: &mut Map<String, Value>,
    version: OpenApiVersion,
    pointer: &str,
) -> Result<(), CompileError> {
    let Some(flag) = map.get(NULLABLE_FIELD).and_then(|v| v.as_bool()) else {
        return Ok(());
    };
    if !version.supports_nullable() {
        return Err(CompileError::NullableNotSupported(pointer.to_string()));
    }
    map.remove(NULLABLE_FIELD);
    if !flag {
        return Ok(());
    }
    match map.get_mut(TYPE_FIELD) {
        Some(Value::String(single)) => {
            let single = single.clone();
            map.insert(TYPE_FIELD.to_string(), json!([single, "null"]));
        }
        Some(Value::Array(types)) => {
            if !types.iter().any(|t| t == "null") {
                types.push(json!("null"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Extends scalar `type` declarations with `"string"` and attaches a
/// syntactic guard pattern through `allOf`, so strings that do not parse as
/// the declared scalar still fail.
fn apply_scalar_coercion(map: &mut Map<String, Value>) {
    let mut guards: Vec<&'static str> = Vec::new();
    match map.get_mut(TYPE_FIELD) {
        Some(Value::String(single)) => {
            if let Some(guard) = coercion_guard(single) {
                let single = single.clone();
                guards.push(guard);
                map.insert(TYPE_FIELD.to_string(), json!([single, "string"]));
            }
        }
        Some(Value::Array(types)) => {
            if !types.iter().any(|t| t == "string") {
                for declared in types.iter() {
                    if let Some(guard) = declared.as_str().and_then(coercion_guard) {
                        guards.push(guard);
                    }
                }
                if !guards.is_empty() {
                    types.push(json!("string"));
                }
            }
        }
        _ => {}
    }
    if guards.is_empty() {
        return;
    }
    let pattern = if guards.len() == 1 {
        guards[0].to_string()
    } else {
        // Strip the anchors of each alternative and re-anchor the union.
        let union = guards
            .iter()
            .map(|g| g.trim_start_matches('^').trim_end_matches('$'))
            .collect::<Vec<_>>()
            .join("|");
        format!("^({})$", union)
    };
    let guard_schema = json!({ "pattern": pattern });
    match map.get_mut("allOf") {
        Some(Value::Array(all_of)) => all_of.push(guard_schema),
        _ => {
            map.insert("allOf".to_string(), json!([guard_schema]));
        }
    }
}

/// Rewrites `#/…` references into `@@root#/…` so standalone schemas keep
/// resolving against the registered document.
fn anchor_local_refs(node: &mut Value) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut(REF_FIELD) {
                if reference.starts_with("#/") {
                    *reference = format!("{}{}", ROOT_ID, reference);
                }
            }
            for (key, child) in map.iter_mut() {
                if !OPAQUE_KEYS.contains(&key.as_str()) {
                    anchor_local_refs(child);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                anchor_local_refs(item);
            }
        }
        _ => {}
    }
}

fn coercion_guard(declared: &str) -> Option<&'static str> {
    match declared {
        "boolean" => Some(BOOLEAN_TOKEN_PATTERN),
        "integer" => Some(INTEGER_TOKEN_PATTERN),
        "number" => Some(NUMBER_TOKEN_PATTERN),
        _ => None,
    }
}

struct ContentEncodingAssertion {
    encoding: String,
}

impl Keyword for ContentEncodingAssertion {
    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
    ) -> Result<(), EngineError<'i>> {
        if self.is_valid(instance) {
            Ok(())
        } else {
            Err(EngineError::custom(
                Location::new(),
                location.into(),
                instance,
                format!("value is not valid under content encoding '{}'", self.encoding),
            ))
        }
    }

    fn is_valid(&self, instance: &Value) -> bool {
        let Some(text) = instance.as_str() else { return true };
        match self.encoding.as_str() {
            "base64" => is_base64(text),
            // Unknown encodings stay annotations.
            _ => true,
        }
    }
}

struct ContentMediaTypeAssertion {
    media_type: String,
}

impl Keyword for ContentMediaTypeAssertion {
    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
    ) -> Result<(), EngineError<'i>> {
        if self.is_valid(instance) {
            Ok(())
        } else {
            Err(EngineError::custom(
                Location::new(),
                location.into(),
                instance,
                format!("value is not valid '{}' content", self.media_type),
            ))
        }
    }

    fn is_valid(&self, instance: &Value) -> bool {
        let Some(text) = instance.as_str() else { return true };
        match self.media_type.as_str() {
            "application/json" => serde_json::from_str::<Value>(text).is_ok(),
            _ => true,
        }
    }
}

fn content_encoding_keyword<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    path: Location,
) -> Result<Box<dyn Keyword>, EngineError<'a>> {
    match value.as_str() {
        Some(encoding) => Ok(Box::new(ContentEncodingAssertion { encoding: encoding.to_string() })),
        None => Err(EngineError::custom(
            path,
            Location::new(),
            value,
            "contentEncoding must be a string",
        )),
    }
}

fn content_media_type_keyword<'a>(
    _parent: &'a Map<String, Value>,
    value: &'a Value,
    path: Location,
) -> Result<Box<dyn Keyword>, EngineError<'a>> {
    match value.as_str() {
        Some(media_type) => {
            Ok(Box::new(ContentMediaTypeAssertion { media_type: media_type.to_string() }))
        }
        None => Err(EngineError::custom(
            path,
            Location::new(),
            value,
            "contentMediaType must be a string",
        )),
    }
}

fn is_base64(text: &str) -> bool {
    if text.len() % 4 != 0 {
        return false;
    }
    let trimmed = text.trim_end_matches('=');
    if text.len() - trimmed.len() > 2 {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
}

#[cfg(test)]
mod test {
    use super::*;

    fn compiler_for(
        document: Value,
        version: OpenApiVersion,
        options: SchemaOptions,
    ) -> Result<SchemaCompiler, CompileError> {
        SchemaCompiler::new(&document, version, options)
    }

    fn openapi_options() -> SchemaOptions {
        SchemaOptions { openapi_mode: true, ..SchemaOptions::default() }
    }

    #[test]
    fn test_nullable_rewrites_under_30() {
        let compiler = compiler_for(
            json!({ "components": { "schemas": { "Name": { "type": "string", "nullable": true } } } }),
            OpenApiVersion::V30x,
            openapi_options(),
        )
        .unwrap();
        let mut path = JsonPath::new();
        path.add("components").add("schemas").add("Name");
        let validator = compiler.compile_pointer(&path).unwrap();
        assert!(validator.validate(&Value::Null).is_ok());
        assert!(validator.validate(&json!("hi")).is_ok());
        assert!(validator.validate(&json!(5)).is_err());
    }

    #[test]
    fn test_nullable_appends_to_type_arrays_once() {
        let compiler = compiler_for(
            json!({ "s": { "type": ["string", "null"], "nullable": true } }),
            OpenApiVersion::V30x,
            openapi_options(),
        );
        assert!(compiler.is_ok());
    }

    #[test]
    fn test_nullable_rejected_under_31() {
        let err = compiler_for(
            json!({ "s": { "type": "string", "nullable": true } }),
            OpenApiVersion::V31x,
            openapi_options(),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("`nullable` keyword is not supported in OpenAPI 3.1+"));
    }

    #[test]
    fn test_nullable_untouched_outside_openapi_mode() {
        // Without openapi mode the walk leaves the keyword alone; the engine
        // treats it as an annotation.
        let compiler = compiler_for(
            json!({ "s": { "type": "string", "nullable": true } }),
            OpenApiVersion::V31x,
            SchemaOptions::default(),
        );
        assert!(compiler.is_ok());
    }

    #[test]
    fn test_scalar_coercion_boolean() {
        let compiler = compiler_for(json!({}), OpenApiVersion::V31x, SchemaOptions {
            scalar_coercion: true,
            ..SchemaOptions::default()
        })
        .unwrap();
        let validator = compiler.compile_inline(&json!({ "type": "boolean" })).unwrap();
        assert!(validator.validate(&json!(true)).is_ok());
        assert!(validator.validate(&json!("true")).is_ok());
        assert!(validator.validate(&json!("0")).is_ok());
        assert!(validator.validate(&json!("notabool")).is_err());
    }

    #[test]
    fn test_scalar_coercion_number_rejects_non_numeric_strings() {
        let compiler = compiler_for(json!({}), OpenApiVersion::V31x, SchemaOptions {
            scalar_coercion: true,
            ..SchemaOptions::default()
        })
        .unwrap();
        let validator = compiler.compile_inline(&json!({ "type": "number" })).unwrap();
        assert!(validator.validate(&json!(1.5)).is_ok());
        assert!(validator.validate(&json!("1.5")).is_ok());
        assert!(validator.validate(&json!("-3e2")).is_ok());
        assert!(validator.validate(&json!("not-a-number")).is_err());
    }

    #[test]
    fn test_coercion_does_not_touch_enum_values() {
        let compiler = compiler_for(json!({}), OpenApiVersion::V31x, SchemaOptions {
            scalar_coercion: true,
            openapi_mode: true,
            ..SchemaOptions::default()
        })
        .unwrap();
        // A data object under `example` carrying a "nullable" key must not
        // trip the 3.1 rejection.
        let schema = json!({ "type": "integer", "example": { "nullable": true } });
        assert!(compiler.compile_inline(&schema).is_ok());
    }

    #[test]
    fn test_compiled_pointer_cache_is_coherent() {
        let compiler = compiler_for(
            json!({ "s": { "type": "integer", "minimum": 3 } }),
            OpenApiVersion::V31x,
            SchemaOptions::default(),
        )
        .unwrap();
        let mut path = JsonPath::new();
        path.add("s");
        let first = compiler.compile_pointer(&path).unwrap();
        let second = compiler.compile_pointer(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        for instance in [json!(2), json!(3), json!("x")] {
            assert_eq!(first.validate(&instance).is_ok(), second.validate(&instance).is_ok());
        }
    }

    #[test]
    fn test_inline_compile_shares_handles_for_equal_bytes() {
        let compiler =
            compiler_for(json!({}), OpenApiVersion::V31x, SchemaOptions::default()).unwrap();
        let a = compiler.compile_inline(&json!({ "type": "string", "minLength": 2 })).unwrap();
        let b = compiler.compile_inline(&json!({ "type": "string", "minLength": 2 })).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_content_assertions() {
        let compiler = compiler_for(json!({}), OpenApiVersion::V31x, SchemaOptions {
            content_assertions: true,
            ..SchemaOptions::default()
        })
        .unwrap();
        let validator = compiler
            .compile_inline(&json!({ "type": "string", "contentEncoding": "base64" }))
            .unwrap();
        assert!(validator.validate(&json!("aGVsbG8=")).is_ok());
        assert!(validator.validate(&json!("@@@not base64@@@")).is_err());

        let validator = compiler
            .compile_inline(&json!({ "type": "string", "contentMediaType": "application/json" }))
            .unwrap();
        assert!(validator.validate(&json!("{\"a\": 1}")).is_ok());
        assert!(validator.validate(&json!("{not json")).is_err());
    }

    #[test]
    fn test_custom_format() {
        let compiler = compiler_for(json!({}), OpenApiVersion::V31x, SchemaOptions {
            format_assertions: true,
            formats: vec![(
                "even-length".to_string(),
                Arc::new(|value: &str| value.len() % 2 == 0) as FormatValidator,
            )],
            ..SchemaOptions::default()
        })
        .unwrap();
        let validator = compiler
            .compile_inline(&json!({ "type": "string", "format": "even-length" }))
            .unwrap();
        assert!(validator.validate(&json!("ab")).is_ok());
        assert!(validator.validate(&json!("abc")).is_err());
    }

    #[test]
    fn test_is_base64() {
        assert!(is_base64("aGVsbG8="));
        assert!(is_base64(""));
        assert!(!is_base64("abc"));
        assert!(!is_base64("a===="));
    }
}
