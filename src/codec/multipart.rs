//! A minimal `multipart/form-data` reader. It understands exactly what the
//! body validator needs: boundary-delimited parts with a `Content-Disposition`
//! name, an optional filename marking file parts, and an optional per-part
//! content type.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MultipartPart {
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MultipartError {
    MissingOpeningBoundary,
    MissingTerminator,
    MalformedPartHeaders,
    MissingPartName,
}

impl Display for MultipartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipartError::MissingOpeningBoundary => {
                write!(f, "The body does not begin with the declared boundary")
            }
            MultipartError::MissingTerminator => {
                write!(f, "The body is missing the closing boundary marker")
            }
            MultipartError::MalformedPartHeaders => {
                write!(f, "A part is missing the blank line separating headers from content")
            }
            MultipartError::MissingPartName => {
                write!(f, "A part has no name in its Content-Disposition header")
            }
        }
    }
}

impl std::error::Error for MultipartError {}

pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<MultipartPart>, MultipartError> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();

    // The body must open with the first delimiter, optionally after a
    // preamble the delimiter line terminates.
    let mut cursor = match find(body, delimiter) {
        Some(start) => start + delimiter.len(),
        None => return Err(MultipartError::MissingOpeningBoundary),
    };

    let mut parts = Vec::new();
    loop {
        if body[cursor..].starts_with(b"--") {
            return Ok(parts);
        }
        cursor = skip_line_break(body, cursor);

        let part_end = match find(&body[cursor..], delimiter) {
            Some(offset) => cursor + offset,
            None => return Err(MultipartError::MissingTerminator),
        };
        let raw_part = trim_trailing_crlf(&body[cursor..part_end]);
        parts.push(read_part(raw_part)?);
        cursor = part_end + delimiter.len();
    }
}

fn read_part(raw: &[u8]) -> Result<MultipartPart, MultipartError> {
    let header_end = find(raw, b"\r\n\r\n")
        .map(|at| (at, at + 4))
        .or_else(|| find(raw, b"\n\n").map(|at| (at, at + 2)))
        .ok_or(MultipartError::MalformedPartHeaders)?;

    let headers = String::from_utf8_lossy(&raw[..header_end.0]);
    let data = raw[header_end.1..].to_vec();

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in headers.lines() {
        let Some((header, value)) = line.split_once(':') else { continue };
        match header.trim().to_ascii_lowercase().as_str() {
            "content-disposition" => {
                for attr in value.split(';') {
                    let Some((key, attr_value)) = attr.split_once('=') else { continue };
                    let attr_value = attr_value.trim().trim_matches('"').to_string();
                    match key.trim() {
                        "name" => name = Some(attr_value),
                        "filename" => filename = Some(attr_value),
                        _ => {}
                    }
                }
            }
            "content-type" => content_type = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let name = name.ok_or(MultipartError::MissingPartName)?;
    Ok(MultipartPart { name, filename, content_type, data })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn skip_line_break(body: &[u8], cursor: usize) -> usize {
    if body[cursor..].starts_with(b"\r\n") {
        cursor + 2
    } else if body[cursor..].starts_with(b"\n") {
        cursor + 1
    } else {
        cursor
    }
}

fn trim_trailing_crlf(raw: &[u8]) -> &[u8] {
    if raw.ends_with(b"\r\n") {
        &raw[..raw.len() - 2]
    } else if raw.ends_with(b"\n") {
        &raw[..raw.len() - 1]
    } else {
        raw
    }
}
