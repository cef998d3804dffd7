use crate::TYPE_FIELD;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The primitive type vocabulary shared by OpenAPI schemas and the decoded
/// value space. Wire tokens are reconstructed into `serde_json::Value`
/// variants through [`cast`] or the strict [`PrimitiveType::parse_token`].
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PrimitiveType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl Display for PrimitiveType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveType::Null => write!(f, "null"),
            PrimitiveType::Boolean => write!(f, "boolean"),
            PrimitiveType::Integer => write!(f, "integer"),
            PrimitiveType::Number => write!(f, "number"),
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Array => write!(f, "array"),
            PrimitiveType::Object => write!(f, "object"),
        }
    }
}

impl FromStr for PrimitiveType {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(PrimitiveType::Null),
            "boolean" => Ok(PrimitiveType::Boolean),
            "integer" => Ok(PrimitiveType::Integer),
            "number" => Ok(PrimitiveType::Number),
            "string" => Ok(PrimitiveType::String),
            "array" => Ok(PrimitiveType::Array),
            "object" => Ok(PrimitiveType::Object),
            other => Err(CastError::UnknownType(other.to_string())),
        }
    }
}

impl PrimitiveType {
    /// Reads the declared `type` of a schema node. OpenAPI permits a single
    /// string or an array of strings; unknown names are skipped.
    pub fn declared_types(schema: &Value) -> Vec<PrimitiveType> {
        match schema.get(TYPE_FIELD) {
            Some(Value::String(name)) => name.parse().into_iter().collect(),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(|n| n.as_str())
                .filter_map(|n| n.parse().ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Strict wire-token parse under this declared type.
    ///
    /// Booleans accept only the literals `true` and `false`; `1` and `0` are
    /// rejected here and only admitted by the scalar-coercion schema path.
    /// Integers reject tokens containing `.` even when they parse as floats.
    pub fn parse_token(&self, token: &str) -> Result<Value, CastError> {
        match self {
            PrimitiveType::Null => Ok(Value::Null),
            PrimitiveType::Boolean => match token {
                "true" => Ok(json!(true)),
                "false" => Ok(json!(false)),
                _ => Err(CastError::NotABoolean(token.to_string())),
            },
            PrimitiveType::Integer => {
                if token.contains('.') {
                    return Err(CastError::NotAnInteger(token.to_string()));
                }
                token
                    .parse::<i64>()
                    .map(|v| json!(v))
                    .map_err(|_| CastError::NotAnInteger(token.to_string()))
            }
            PrimitiveType::Number => token
                .parse::<f64>()
                .map(|v| json!(v))
                .map_err(|_| CastError::NotANumber(token.to_string())),
            PrimitiveType::String => Ok(json!(token)),
            PrimitiveType::Array | PrimitiveType::Object => {
                Err(CastError::NotAScalar(token.to_string(), *self))
            }
        }
    }
}

/// Loss-tolerant scalar reconstruction used while decoding styled objects and
/// arrays: `true`/`false` become booleans, dot-free signed 64-bit integers
/// become integers, parseable floats become numbers, everything else stays a
/// string. This is the only producer of decoded scalar variants.
pub fn cast(token: &str) -> Value {
    match token {
        "true" => return json!(true),
        "false" => return json!(false),
        _ => {}
    }
    if !token.contains('.') {
        if let Ok(int) = token.parse::<i64>() {
            return json!(int);
        }
    }
    if let Ok(float) = token.parse::<f64>() {
        if float.is_finite() {
            return json!(float);
        }
    }
    json!(token)
}

#[derive(Debug)]
pub enum CastError {
    UnknownType(String),
    NotABoolean(String),
    NotAnInteger(String),
    NotANumber(String),
    NotAScalar(String, PrimitiveType),
}

impl Display for CastError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CastError::UnknownType(name) => write!(f, "Unknown schema type '{}'", name),
            CastError::NotABoolean(token) => {
                write!(f, "The value '{}' is not a valid true/false value", token)
            }
            CastError::NotAnInteger(token) => {
                write!(f, "The value '{}' is not a valid integer", token)
            }
            CastError::NotANumber(token) => {
                write!(f, "The value '{}' is not a valid number", token)
            }
            CastError::NotAScalar(token, kind) => {
                write!(f, "The value '{}' cannot be read as a scalar {}", token, kind)
            }
        }
    }
}

impl std::error::Error for CastError {}
