use std::fmt::{Display, Formatter};

/// A tolerantly parsed `Content-Type` header: the lowercased media-type
/// essence plus the two parameters the validator cares about. Unknown
/// parameters are ignored rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub essence: String,
    pub charset: Option<String>,
    pub boundary: Option<String>,
}

impl MediaType {
    pub fn parse(header: &str) -> Option<MediaType> {
        let mut segments = header.split(';');
        let essence = segments.next()?.trim().to_ascii_lowercase();
        if !essence.contains('/') {
            return None;
        }
        let mut charset = None;
        let mut boundary = None;
        for segment in segments {
            let Some((key, value)) = segment.split_once('=') else { continue };
            let value = value.trim().trim_matches('"');
            match key.trim().to_ascii_lowercase().as_str() {
                "charset" => charset = Some(value.to_ascii_lowercase()),
                "boundary" => boundary = Some(value.to_string()),
                _ => {}
            }
        }
        Some(MediaType { essence, charset, boundary })
    }

    pub fn is_json(&self) -> bool {
        self.essence == "application/json" || self.essence.ends_with("+json")
    }

    pub fn is_form_urlencoded(&self) -> bool {
        self.essence == "application/x-www-form-urlencoded"
    }

    pub fn is_multipart_form(&self) -> bool {
        self.essence == "multipart/form-data"
    }

    pub fn is_xml(&self) -> bool {
        self.essence == "application/xml"
            || self.essence == "text/xml"
            || self.essence.ends_with("+xml")
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.essence)
    }
}
