use crate::locator::SpecLocator;
use crate::router::PathRouter;
use crate::schema::{FormatValidator, RegexEngine, SchemaCompiler, SchemaOptions};
use crate::traverser::OpenApiTraverser;
use crate::types::version::OpenApiVersion;
use crate::validator::OpenApiValidator;
use crate::{OPENAPI_FIELD, PATHS_FIELD};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug)]
pub enum ValidatorBuildError {
    NoSpecification,
    LoadFailure(String),
    InvalidSpecification(String),
    UnsupportedVersion(String),
    SchemaCompilation(String),
}

impl Display for ValidatorBuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidatorBuildError::NoSpecification => {
                write!(f, "No specification source provided")
            }
            ValidatorBuildError::LoadFailure(msg) => write!(f, "Load failure: {}", msg),
            ValidatorBuildError::InvalidSpecification(msg) => {
                write!(f, "Invalid specification: {}", msg)
            }
            ValidatorBuildError::UnsupportedVersion(msg) => {
                write!(f, "Unsupported version: {}", msg)
            }
            ValidatorBuildError::SchemaCompilation(msg) => {
                write!(f, "Schema compilation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidatorBuildError {}

enum SpecSource {
    None,
    File(String),
    Text(String),
    Value(Value),
}

/// Builder for [`OpenApiValidator`]: choose the spec source and the
/// validation options, then [`build`](OpenApiValidatorBuilder::build).
///
/// OpenAPI preprocessing (the `nullable` handling) defaults to on; the other
/// options default to off.
pub struct OpenApiValidatorBuilder {
    source: SpecSource,
    options: SchemaOptions,
}

impl Default for OpenApiValidatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenApiValidatorBuilder {
    pub fn new() -> Self {
        Self {
            source: SpecSource::None,
            options: SchemaOptions { openapi_mode: true, ..SchemaOptions::default() },
        }
    }

    pub fn load_from_file(mut self, path: impl Into<String>) -> Self {
        self.source = SpecSource::File(path.into());
        self
    }

    /// Uses raw specification text. JSON text also feeds the source locator,
    /// so errors carry line/column positions; YAML parses but locates at
    /// (0, 0).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.source = SpecSource::Text(text.into());
        self
    }

    pub fn with_value(mut self, spec: Value) -> Self {
        self.source = SpecSource::Value(spec);
        self
    }

    /// Turn `format` keywords into hard errors.
    pub fn format_assertions(mut self) -> Self {
        self.options.format_assertions = true;
        self
    }

    /// Turn `contentEncoding`/`contentMediaType` keywords into hard errors.
    pub fn content_assertions(mut self) -> Self {
        self.options.content_assertions = true;
        self
    }

    /// Register a user format validator by name.
    pub fn custom_format(
        mut self,
        name: impl Into<String>,
        validator: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.options.formats.push((name.into(), Arc::new(validator) as FormatValidator));
        self
    }

    pub fn regex_engine(mut self, engine: RegexEngine) -> Self {
        self.options.regex_engine = engine;
        self
    }

    pub fn openapi_mode(mut self, enabled: bool) -> Self {
        self.options.openapi_mode = enabled;
        self
    }

    /// Accept stringly-typed booleans/numbers for scalar schemas.
    pub fn scalar_coercion(mut self) -> Self {
        self.options.scalar_coercion = true;
        self
    }

    pub fn build(self) -> Result<OpenApiValidator, ValidatorBuildError> {
        let (spec, json_text) = match self.source {
            SpecSource::None => return Err(ValidatorBuildError::NoSpecification),
            SpecSource::File(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| ValidatorBuildError::LoadFailure(e.to_string()))?;
                parse_spec_text(text)?
            }
            SpecSource::Text(text) => parse_spec_text(text)?,
            SpecSource::Value(spec) => (spec, None),
        };

        let version = spec
            .get(OPENAPI_FIELD)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ValidatorBuildError::InvalidSpecification(format!(
                    "The document does not contain an '{}' field",
                    OPENAPI_FIELD
                ))
            })?;
        let version = OpenApiVersion::from_str(version)
            .map_err(|e| ValidatorBuildError::UnsupportedVersion(e.to_string()))?;

        let locator = match json_text {
            Some(text) => SpecLocator::from_json_text(&text)
                .map_err(|e| ValidatorBuildError::InvalidSpecification(e.to_string()))?,
            None => SpecLocator::default(),
        };

        let compiler = SchemaCompiler::new(&spec, version, self.options)
            .map_err(|e| ValidatorBuildError::SchemaCompilation(e.to_string()))?;
        let router = PathRouter::from_paths(spec.get(PATHS_FIELD).unwrap_or(&Value::Null));
        let traverser = OpenApiTraverser::new(spec);

        Ok(OpenApiValidator::assemble(traverser, compiler, router, locator))
    }
}

/// Parses specification text as JSON first, falling back to YAML. Only JSON
/// text is returned for location indexing.
fn parse_spec_text(text: String) -> Result<(Value, Option<String>), ValidatorBuildError> {
    match serde_json::from_str::<Value>(&text) {
        Ok(spec) => Ok((spec, Some(text))),
        Err(json_error) => match serde_yaml::from_str::<Value>(&text) {
            Ok(spec) => Ok((spec, None)),
            Err(yaml_error) => Err(ValidatorBuildError::InvalidSpecification(format!(
                "not JSON ({}) and not YAML ({})",
                json_error, yaml_error
            ))),
        },
    }
}
