use crate::{ENCODED_SLASH, ENCODED_TILDE, PATH_SEPARATOR, TILDE};
use serde::Serialize;

/// Escapes a single RFC 6901 reference token: `~` becomes `~0`, `/` becomes `~1`.
pub fn escape_segment(segment: &str) -> String {
    segment.replace(TILDE, ENCODED_TILDE).replace(PATH_SEPARATOR, ENCODED_SLASH)
}

/// Reverses [`escape_segment`]. `~1` is decoded before `~0` so that `~01`
/// round-trips to `~1` and not to a slash.
pub fn unescape_segment(segment: &str) -> String {
    segment.replace(ENCODED_SLASH, PATH_SEPARATOR).replace(ENCODED_TILDE, TILDE)
}

/// An ordered list of already-escaped JSON pointer segments into the
/// specification document.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct JsonPath(pub Vec<String>);

impl JsonPath {
    pub fn new() -> Self {
        JsonPath(Vec::new())
    }

    pub fn add(&mut self, segment: impl AsRef<str>) -> &mut Self {
        let segment = segment.as_ref();
        if segment.contains(TILDE) || segment.contains(PATH_SEPARATOR) {
            self.0.push(escape_segment(segment));
        } else {
            self.0.push(segment.to_owned());
        }
        self
    }

    /// Adds a path template such as `/orders/{id}`. The leading slash is
    /// dropped before escaping, so `/orders/{id}` renders as `orders~1{id}`
    /// inside a pointer.
    pub fn add_template(&mut self, template: impl AsRef<str>) -> &mut Self {
        self.add(template.as_ref().trim_start_matches(PATH_SEPARATOR))
    }

    /// The segments joined without a leading slash, usable as the fragment of
    /// a `$ref` pointer (`@@root#/<this>`).
    pub fn format_path(&self) -> String {
        self.0.join(PATH_SEPARATOR)
    }

    /// The RFC 6901 pointer form with a leading slash.
    pub fn pointer(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        format!("/{}", self.format_path())
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

/// Renders an instance-location segment list as a JSONPath expression.
///
/// Numeric segments become `[N]`, plain identifiers become `.name`, and
/// anything else becomes a bracketed single-quoted accessor with `\` and `'`
/// escaped. Deriving from `[a, b, c]` equals deriving from `[a]` and then
/// appending `b` and `c`, so partial paths can be extended in place.
pub fn jsonpath_from_segments<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::from("$");
    for segment in segments {
        append_jsonpath_segment(&mut out, segment.as_ref());
    }
    out
}

pub fn append_jsonpath_segment(path: &mut String, segment: &str) {
    if is_index(segment) {
        path.push('[');
        path.push_str(segment);
        path.push(']');
    } else if is_identifier(segment) {
        path.push('.');
        path.push_str(segment);
    } else {
        let escaped = segment.replace('\\', "\\\\").replace('\'', "\\'");
        path.push_str("['");
        path.push_str(&escaped);
        path.push_str("']");
    }
}
