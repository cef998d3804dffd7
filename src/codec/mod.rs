//! Decoding of wire-encoded parameter strings under the seven OpenAPI
//! serialization styles, and the small encoders used to build fix
//! suggestions. This is the only module that turns raw request tokens into
//! typed values.

pub mod media_type;
pub mod multipart;
pub mod xml;

use crate::types::primitive::cast;
use crate::types::ParameterLocation;
use crate::{ADDITIONAL_PROPERTIES_FIELD, PROPERTIES_FIELD, TYPE_FIELD};
use serde_json::{json, Map, Value};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// RFC 3986 reserved characters rejected in query values unless
/// `allowReserved` is set. Matrix-style parameters are exempt since the style
/// itself is built from reserved characters.
pub const RESERVED_CHARACTERS: &str = ":/?#[]@!$&'()*+,;=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
    Simple,
    Matrix,
    Label,
}

impl ParameterStyle {
    /// The default style for a parameter location: query and cookie use
    /// `form`, path and header use `simple`.
    pub fn default_for(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        }
    }

    /// `explode` defaults to true exactly when the style is `form`.
    pub fn default_explode(&self) -> bool {
        matches!(self, ParameterStyle::Form)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterStyle::Form => "form",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
            ParameterStyle::Simple => "simple",
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
        }
    }

    /// The item delimiter for non-exploded multi-value encodings.
    pub fn delimiter(&self) -> char {
        match self {
            ParameterStyle::SpaceDelimited => ' ',
            ParameterStyle::PipeDelimited => '|',
            _ => ',',
        }
    }
}

impl Display for ParameterStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ParameterStyle {
    type Err = StyleFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(ParameterStyle::Form),
            "spaceDelimited" => Ok(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Ok(ParameterStyle::PipeDelimited),
            "deepObject" => Ok(ParameterStyle::DeepObject),
            "simple" => Ok(ParameterStyle::Simple),
            "matrix" => Ok(ParameterStyle::Matrix),
            "label" => Ok(ParameterStyle::Label),
            other => Err(StyleFault::UnknownStyle(other.to_string())),
        }
    }
}

/// The shape the schema expects the decoded value to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTarget {
    Scalar,
    Array,
    Object,
}

impl ValueTarget {
    pub fn of_schema(schema: &Value) -> Self {
        match schema.get(TYPE_FIELD).and_then(|t| t.as_str()) {
            Some("array") => ValueTarget::Array,
            Some("object") => ValueTarget::Object,
            Some(_) => ValueTarget::Scalar,
            // An untyped schema with properties is treated as an object.
            None if schema.get(PROPERTIES_FIELD).is_some() => ValueTarget::Object,
            None => ValueTarget::Scalar,
        }
    }
}

/// One decoded query entry: the key, the bracketed property for `deepObject`
/// keys of the shape `name[prop]`, and every raw value observed for that key
/// in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub key: String,
    pub property: Option<String>,
    pub values: Vec<String>,
}

impl QueryParam {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self { key: key.into(), property: None, values }
    }
}

/// Parses a raw query string into ordered, grouped [`QueryParam`]s.
///
/// Keys and values are percent-decoded; `name[prop]` keys are split into key
/// and property so `deepObject` parameters group per property. Pairs without
/// a `=` decode to an empty value, matching lenient server behavior.
pub fn parse_query(raw: &str) -> Vec<QueryParam> {
    let mut params: Vec<QueryParam> = Vec::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(pair), String::new()),
        };
        if key.is_empty() {
            log::warn!("Skipping malformed query pair '{}'", pair);
            continue;
        }
        let (key, property) = split_deep_object_key(&key);
        match params
            .iter_mut()
            .find(|p| p.key == key && p.property.as_deref() == property)
        {
            Some(existing) => existing.values.push(value),
            None => params.push(QueryParam {
                key: key.to_string(),
                property: property.map(str::to_string),
                values: vec![value],
            }),
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw).decode_utf8_lossy().to_string()
}

/// Splits `name[prop]` on the first `[` and its matching `]`. Keys without a
/// well-formed bracket pair are returned untouched.
fn split_deep_object_key(key: &str) -> (&str, Option<&str>) {
    if let Some(open) = key.find('[') {
        if let Some(close) = key[open..].find(']') {
            return (&key[..open], Some(&key[open + 1..open + close]));
        }
    }
    (key, None)
}

/// A style-level decoding failure, detected before any schema validation.
#[derive(Debug, PartialEq, Eq)]
pub enum StyleFault {
    UnknownStyle(String),
    IncorrectFormEncoding { name: String, value: String },
    IncorrectSpaceDelimiting { name: String, detail: String },
    IncorrectPipeDelimiting { name: String, detail: String },
    InvalidDeepObject { name: String, property: String, count: usize },
    IncorrectReservedValues { name: String, value: String },
}

impl StyleFault {
    /// The short signal name used as the error `Reason` prefix.
    pub fn signal(&self) -> &'static str {
        match self {
            StyleFault::UnknownStyle(_) => "UnknownStyle",
            StyleFault::IncorrectFormEncoding { .. } => "IncorrectFormEncoding",
            StyleFault::IncorrectSpaceDelimiting { .. } => "IncorrectSpaceDelimiting",
            StyleFault::IncorrectPipeDelimiting { .. } => "IncorrectPipeDelimiting",
            StyleFault::InvalidDeepObject { .. } => "InvalidDeepObject",
            StyleFault::IncorrectReservedValues { .. } => "IncorrectReservedValues",
        }
    }
}

impl Display for StyleFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StyleFault::UnknownStyle(style) => {
                write!(f, "The style '{}' is not a known serialization style", style)
            }
            StyleFault::IncorrectFormEncoding { name, value } => write!(
                f,
                "The query parameter '{}' is using the form style with explode set, \
                 but received the comma separated value '{}'",
                name, value
            ),
            StyleFault::IncorrectSpaceDelimiting { name, detail } => write!(
                f,
                "The query parameter '{}' is using the spaceDelimited style: {}",
                name, detail
            ),
            StyleFault::IncorrectPipeDelimiting { name, detail } => write!(
                f,
                "The query parameter '{}' is using the pipeDelimited style: {}",
                name, detail
            ),
            StyleFault::InvalidDeepObject { name, property, count } => write!(
                f,
                "The query parameter '{}' uses the deepObject style, but the property \
                 '{}' received multiple values ({})",
                name, property, count
            ),
            StyleFault::IncorrectReservedValues { name, value } => write!(
                f,
                "The parameter '{}' value '{}' contains reserved characters \
                 and allowReserved is not set",
                name, value
            ),
        }
    }
}

impl std::error::Error for StyleFault {}

/// The style-consistency gate: rejects configurations the declared style
/// cannot have produced, before any decoding happens.
pub fn check_style_consistency(
    style: ParameterStyle,
    explode: bool,
    param: &QueryParam,
    target: ValueTarget,
) -> Result<(), StyleFault> {
    match style {
        ParameterStyle::DeepObject => {
            if param.values.len() > 1 {
                return Err(StyleFault::InvalidDeepObject {
                    name: param.key.clone(),
                    property: param.property.clone().unwrap_or_default(),
                    count: param.values.len(),
                });
            }
        }
        ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited => {
            if !explode && param.values.len() > 1 {
                let detail = format!(
                    "explode is not set, yet multiple values ({}) were received",
                    param.values.len()
                );
                return Err(delimited_fault(style, &param.key, detail));
            }
            // A comma inside a space/pipe delimited value signals an object
            // mis-encoded under a foreign style.
            if let Some(bad) = param.values.iter().find(|v| v.contains(',')) {
                let detail = format!("the value '{}' contains a foreign ',' delimiter", bad);
                return Err(delimited_fault(style, &param.key, detail));
            }
        }
        ParameterStyle::Form => {
            if explode && target == ValueTarget::Object {
                if let [single] = param.values.as_slice() {
                    if single.contains(',') {
                        return Err(StyleFault::IncorrectFormEncoding {
                            name: param.key.clone(),
                            value: single.clone(),
                        });
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn delimited_fault(style: ParameterStyle, name: &str, detail: String) -> StyleFault {
    match style {
        ParameterStyle::SpaceDelimited => {
            StyleFault::IncorrectSpaceDelimiting { name: name.to_string(), detail }
        }
        _ => StyleFault::IncorrectPipeDelimiting { name: name.to_string(), detail },
    }
}

/// Returns the first reserved character found in `value`, if any.
pub fn find_reserved_character(value: &str) -> Option<char> {
    value.chars().find(|c| RESERVED_CHARACTERS.contains(*c))
}

/// Decodes `form`-style values (the query/cookie default).
///
/// With `explode`, every wire value is independent: arrays collect them all,
/// scalars take the single value. Without `explode`, a comma-containing value
/// is one compound token: alternating key/value pairs for objects, a plain
/// list for arrays.
pub fn decode_form(param: &QueryParam, explode: bool, target: ValueTarget) -> Value {
    match target {
        ValueTarget::Object if !explode => {
            pairs_to_object(param.values.first().map(String::as_str).unwrap_or(""), ',')
        }
        ValueTarget::Array => {
            if explode {
                Value::Array(param.values.iter().map(|v| cast(v)).collect())
            } else {
                split_to_array(param.values.first().map(String::as_str).unwrap_or(""), ',')
            }
        }
        _ => param.values.first().map(|v| cast(v)).unwrap_or(Value::Null),
    }
}

/// Decodes `spaceDelimited`/`pipeDelimited` values. Exploded values behave
/// like `form`; non-exploded compound values split on the style delimiter.
pub fn decode_delimited(
    param: &QueryParam,
    style: ParameterStyle,
    explode: bool,
    target: ValueTarget,
) -> Value {
    let delimiter = style.delimiter();
    match target {
        ValueTarget::Object if !explode => {
            pairs_to_object(param.values.first().map(String::as_str).unwrap_or(""), delimiter)
        }
        ValueTarget::Array => {
            if explode {
                Value::Array(param.values.iter().map(|v| cast(v)).collect())
            } else {
                split_to_array(param.values.first().map(String::as_str).unwrap_or(""), delimiter)
            }
        }
        _ => param.values.first().map(|v| cast(v)).unwrap_or(Value::Null),
    }
}

/// Assembles a `deepObject` parameter from every `name[prop]` occurrence.
///
/// Each occurrence contributes `result[prop] = cast(value)`. When the schema
/// declares the property as an array, directly or through array-typed
/// `additionalProperties`, repeated occurrences accumulate in order instead
/// of overwriting.
pub fn decode_deep_object(entries: &[&QueryParam], schema: &Value) -> Value {
    let mut object = Map::new();
    for entry in entries {
        let Some(property) = entry.property.as_deref() else { continue };
        let accumulate = property_is_array(schema, property);
        for raw in &entry.values {
            let value = cast(raw);
            if accumulate {
                match object.get_mut(property) {
                    Some(Value::Array(items)) => items.push(value),
                    _ => {
                        object.insert(property.to_string(), Value::Array(vec![value]));
                    }
                }
            } else {
                object.insert(property.to_string(), value);
            }
        }
    }
    Value::Object(object)
}

fn property_is_array(schema: &Value, property: &str) -> bool {
    if let Some(declared) = schema
        .get(PROPERTIES_FIELD)
        .and_then(|props| props.get(property))
        .and_then(|prop| prop.get(TYPE_FIELD))
        .and_then(|t| t.as_str())
    {
        return declared == "array";
    }
    schema
        .get(ADDITIONAL_PROPERTIES_FIELD)
        .and_then(|ap| ap.get(TYPE_FIELD))
        .and_then(|t| t.as_str())
        .is_some_and(|t| t == "array")
}

/// Decodes a `simple`-style value (the path/header default): comma-separated
/// tokens, alternating key/value pairs for objects. Exploded objects use
/// `key=value` segments instead.
pub fn decode_simple(raw: &str, explode: bool, target: ValueTarget) -> Value {
    match target {
        ValueTarget::Object => {
            if explode {
                kv_segments_to_object(raw.split(','))
            } else {
                pairs_to_object(raw, ',')
            }
        }
        ValueTarget::Array => split_to_array(raw, ','),
        ValueTarget::Scalar => cast(raw),
    }
}

/// Decodes a `matrix`-style path value: a leading `;`, then `;key=value`
/// segments. Exploded arrays repeat the name (`;id=3;id=4`), exploded
/// objects use one segment per property, and non-exploded values pack
/// everything into `;name=v1,v2`.
pub fn decode_matrix(raw: &str, name: &str, explode: bool, target: ValueTarget) -> Value {
    let segments: Vec<&str> = raw
        .strip_prefix(';')
        .unwrap_or(raw)
        .split(';')
        .filter(|s| !s.is_empty())
        .collect();

    if explode {
        match target {
            ValueTarget::Array => Value::Array(
                segments
                    .iter()
                    .filter_map(|seg| seg.split_once('='))
                    .filter(|(key, _)| *key == name)
                    .map(|(_, value)| cast(value))
                    .collect(),
            ),
            ValueTarget::Object => {
                kv_segments_to_object(segments.iter().copied())
            }
            ValueTarget::Scalar => segments
                .iter()
                .filter_map(|seg| seg.split_once('='))
                .find(|(key, _)| *key == name)
                .map(|(_, value)| cast(value))
                .unwrap_or(Value::Null),
        }
    } else {
        let packed = segments
            .iter()
            .filter_map(|seg| seg.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .unwrap_or("");
        match target {
            ValueTarget::Object => pairs_to_object(packed, ','),
            ValueTarget::Array => split_to_array(packed, ','),
            ValueTarget::Scalar => cast(packed),
        }
    }
}

/// Decodes a `label`-style path value: a leading `.`, then `.value` segments
/// (`.key=value` for exploded objects).
pub fn decode_label(raw: &str, explode: bool, target: ValueTarget) -> Value {
    let body = raw.strip_prefix('.').unwrap_or(raw);
    match target {
        ValueTarget::Object => {
            if explode {
                kv_segments_to_object(body.split('.'))
            } else {
                pairs_to_object(&body.replace('.', ","), ',')
            }
        }
        ValueTarget::Array => {
            if body.contains('.') {
                Value::Array(body.split('.').filter(|s| !s.is_empty()).map(cast).collect())
            } else {
                split_to_array(body, ',')
            }
        }
        ValueTarget::Scalar => cast(body),
    }
}

fn split_to_array(raw: &str, delimiter: char) -> Value {
    if raw.is_empty() {
        return json!([]);
    }
    Value::Array(raw.split(delimiter).map(cast).collect())
}

/// Alternating `k,v,k,v` compound tokens into an object. A trailing key with
/// no value decodes to an empty string, staying loss-tolerant.
fn pairs_to_object(raw: &str, delimiter: char) -> Value {
    let mut object = Map::new();
    let mut tokens = raw.split(delimiter).filter(|s| !s.is_empty());
    while let Some(key) = tokens.next() {
        let value = tokens.next().unwrap_or("");
        object.insert(key.to_string(), cast(value));
    }
    Value::Object(object)
}

fn kv_segments_to_object<'a>(segments: impl Iterator<Item = &'a str>) -> Value {
    let mut object = Map::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match segment.split_once('=') {
            Some((key, value)) => object.insert(key.to_string(), cast(value)),
            None => object.insert(segment.to_string(), Value::String(String::new())),
        };
    }
    Value::Object(object)
}

/// Renders the exploded `form` encoding of a value list, for fix hints:
/// `key=v1&key=v2`.
pub fn collapse_into_form(key: &str, values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("{}={}", key, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Renders the non-exploded `spaceDelimited` encoding: `key=v1%20v2`.
pub fn collapse_into_space_delimited(key: &str, values: &[&str]) -> String {
    format!("{}={}", key, values.join("%20"))
}

/// Renders the non-exploded `pipeDelimited` encoding: `key=v1|v2`.
pub fn collapse_into_pipe_delimited(key: &str, values: &[&str]) -> String {
    format!("{}={}", key, values.join("|"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_query_groups_and_orders() {
        let params = parse_query("a=1&b=2&a=3");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].key, "a");
        assert_eq!(params[0].values, vec!["1", "3"]);
        assert_eq!(params[1].key, "b");
    }

    #[test]
    fn test_parse_query_deep_object_keys() {
        let params = parse_query("filter%5Ba%5D=1&filter[b]=2");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].key, "filter");
        assert_eq!(params[0].property.as_deref(), Some("a"));
        assert_eq!(params[1].property.as_deref(), Some("b"));
    }

    #[test]
    fn test_parse_query_tolerates_missing_values() {
        let params = parse_query("flag&x=");
        assert_eq!(params[0].values, vec![""]);
        assert_eq!(params[1].values, vec![""]);
    }

    #[test]
    fn test_form_decoding() {
        let param = QueryParam::new("id", vec!["3".into(), "4".into()]);
        assert_eq!(decode_form(&param, true, ValueTarget::Array), json!([3, 4]));

        let param = QueryParam::new("id", vec!["3,4,5".into()]);
        assert_eq!(decode_form(&param, false, ValueTarget::Array), json!([3, 4, 5]));

        let param = QueryParam::new("point", vec!["x,1,y,2".into()]);
        assert_eq!(decode_form(&param, false, ValueTarget::Object), json!({"x": 1, "y": 2}));

        let param = QueryParam::new("limit", vec!["10".into()]);
        assert_eq!(decode_form(&param, true, ValueTarget::Scalar), json!(10));
    }

    #[test]
    fn test_delimited_decoding() {
        let param = QueryParam::new("id", vec!["3 4 5".into()]);
        assert_eq!(
            decode_delimited(&param, ParameterStyle::SpaceDelimited, false, ValueTarget::Array),
            json!([3, 4, 5])
        );

        let param = QueryParam::new("id", vec!["a|b".into()]);
        assert_eq!(
            decode_delimited(&param, ParameterStyle::PipeDelimited, false, ValueTarget::Array),
            json!(["a", "b"])
        );
    }

    #[test]
    fn test_deep_object_decoding() {
        let schema = json!({"type": "object"});
        let a = QueryParam { key: "filter".into(), property: Some("a".into()), values: vec!["1".into()] };
        let b = QueryParam { key: "filter".into(), property: Some("b".into()), values: vec!["true".into()] };
        let decoded = decode_deep_object(&[&a, &b], &schema);
        assert_eq!(decoded, json!({"a": 1, "b": true}));
    }

    #[test]
    fn test_deep_object_array_accumulation() {
        let schema = json!({
            "type": "object",
            "properties": { "tag": { "type": "array", "items": { "type": "string" } } }
        });
        let tag = QueryParam {
            key: "filter".into(),
            property: Some("tag".into()),
            values: vec!["red".into(), "blue".into()],
        };
        assert_eq!(decode_deep_object(&[&tag], &schema), json!({"tag": ["red", "blue"]}));

        // additionalProperties typed as array accumulates too.
        let schema = json!({
            "type": "object",
            "additionalProperties": { "type": "array" }
        });
        assert_eq!(decode_deep_object(&[&tag], &schema), json!({"tag": ["red", "blue"]}));
    }

    #[test]
    fn test_simple_decoding() {
        assert_eq!(decode_simple("3,4,5", false, ValueTarget::Array), json!([3, 4, 5]));
        assert_eq!(decode_simple("R,100,G,200", false, ValueTarget::Object), json!({"R": 100, "G": 200}));
        assert_eq!(decode_simple("R=100,G=200", true, ValueTarget::Object), json!({"R": 100, "G": 200}));
        assert_eq!(decode_simple("42", false, ValueTarget::Scalar), json!(42));
    }

    #[test]
    fn test_matrix_decoding() {
        assert_eq!(decode_matrix(";id=5", "id", false, ValueTarget::Scalar), json!(5));
        assert_eq!(
            decode_matrix(";id=3;id=4;id=5", "id", true, ValueTarget::Array),
            json!([3, 4, 5])
        );
        assert_eq!(
            decode_matrix(";id=3,4,5", "id", false, ValueTarget::Array),
            json!([3, 4, 5])
        );
        assert_eq!(
            decode_matrix(";R=100;G=200", "color", true, ValueTarget::Object),
            json!({"R": 100, "G": 200})
        );
        assert_eq!(
            decode_matrix(";color=R,100,G,200", "color", false, ValueTarget::Object),
            json!({"R": 100, "G": 200})
        );
    }

    #[test]
    fn test_label_decoding() {
        assert_eq!(decode_label(".5", false, ValueTarget::Scalar), json!(5));
        assert_eq!(decode_label(".3.4.5", false, ValueTarget::Array), json!([3, 4, 5]));
        assert_eq!(decode_label(".R=100.G=200", true, ValueTarget::Object), json!({"R": 100, "G": 200}));
        assert_eq!(decode_label(".R.100.G.200", false, ValueTarget::Object), json!({"R": 100, "G": 200}));
    }

    #[test]
    fn test_style_gate_deep_object_multi_value() {
        let param = QueryParam {
            key: "filter".into(),
            property: Some("a".into()),
            values: vec!["1".into(), "2".into()],
        };
        let fault = check_style_consistency(
            ParameterStyle::DeepObject,
            true,
            &param,
            ValueTarget::Object,
        )
        .unwrap_err();
        assert_eq!(fault.signal(), "InvalidDeepObject");
        assert!(fault.to_string().contains("multiple values (2)"));
    }

    #[test]
    fn test_style_gate_delimited() {
        let multi = QueryParam::new("id", vec!["1".into(), "2".into()]);
        assert_eq!(
            check_style_consistency(ParameterStyle::PipeDelimited, false, &multi, ValueTarget::Array)
                .unwrap_err()
                .signal(),
            "IncorrectPipeDelimiting"
        );
        let foreign = QueryParam::new("id", vec!["a,b".into()]);
        assert_eq!(
            check_style_consistency(ParameterStyle::SpaceDelimited, true, &foreign, ValueTarget::Array)
                .unwrap_err()
                .signal(),
            "IncorrectSpaceDelimiting"
        );
    }

    #[test]
    fn test_style_gate_form_exploded_object() {
        let compound = QueryParam::new("point", vec!["x,1,y,2".into()]);
        assert_eq!(
            check_style_consistency(ParameterStyle::Form, true, &compound, ValueTarget::Object)
                .unwrap_err()
                .signal(),
            "IncorrectFormEncoding"
        );
        // Arrays may legitimately carry commas under explode=false.
        assert!(check_style_consistency(ParameterStyle::Form, false, &compound, ValueTarget::Object)
            .is_ok());
    }

    #[test]
    fn test_reserved_character_scan() {
        assert_eq!(find_reserved_character("plain-value_1.2"), None);
        assert_eq!(find_reserved_character("a/b"), Some('/'));
        assert_eq!(find_reserved_character("x=y"), Some('='));
    }

    #[test]
    fn test_collapse_encoders() {
        let values = ["3", "4", "5"];
        assert_eq!(collapse_into_form("id", &values), "id=3&id=4&id=5");
        assert_eq!(collapse_into_space_delimited("id", &values), "id=3%204%205");
        assert_eq!(collapse_into_pipe_delimited("id", &values), "id=3|4|5");
    }

    #[test]
    fn test_encoders_round_trip_through_decoders() {
        let expected = json!([3, 4, 5]);
        let values = ["3", "4", "5"];

        let wire = collapse_into_form("id", &values);
        let params = parse_query(&wire);
        assert_eq!(params.len(), 1);
        assert_eq!(decode_form(&params[0], true, ValueTarget::Array), expected);

        let wire = collapse_into_space_delimited("id", &values);
        let params = parse_query(&wire);
        assert_eq!(
            decode_delimited(&params[0], ParameterStyle::SpaceDelimited, false, ValueTarget::Array),
            expected
        );

        let wire = collapse_into_pipe_delimited("id", &values);
        let params = parse_query(&wire);
        assert_eq!(
            decode_delimited(&params[0], ParameterStyle::PipeDelimited, false, ValueTarget::Array),
            expected
        );
    }
}
