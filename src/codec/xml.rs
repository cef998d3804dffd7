//! A minimal XML reader for body validation: element tree with prefixes,
//! namespace declarations and attributes, plus a generic conversion into the
//! decoded value space so XML payloads run through the same schema kernel as
//! JSON ones.

use crate::types::primitive::cast;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Local element name, without prefix.
    pub name: String,
    pub prefix: Option<String>,
    /// `xmlns`/`xmlns:p` declarations on this element: (prefix, uri).
    pub namespaces: Vec<(Option<String>, String)>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// The namespace URI declared for this element's prefix, searching only
    /// this element's own declarations.
    pub fn declared_namespace(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum XmlError {
    UnexpectedEnd,
    MismatchedClosingTag { expected: String, found: String },
    Malformed(String),
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            XmlError::UnexpectedEnd => write!(f, "Unexpected end of XML input"),
            XmlError::MismatchedClosingTag { expected, found } => {
                write!(f, "Closing tag '{}' does not match opening tag '{}'", found, expected)
            }
            XmlError::Malformed(msg) => write!(f, "Malformed XML: {}", msg),
        }
    }
}

impl std::error::Error for XmlError {}

pub fn parse_xml(text: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader { chars: text.chars().collect(), pos: 0 };
    reader.skip_misc();
    let root = reader.read_element()?;
    reader.skip_misc();
    if !reader.at_end() {
        return Err(XmlError::Malformed("content after the root element".to_string()));
    }
    Ok(root)
}

/// Converts an element into the decoded value space: elements with children
/// become objects (repeated child names accumulate into arrays), leaf
/// elements cast their text content.
pub fn element_to_value(element: &XmlElement) -> Value {
    if element.children.is_empty() {
        return cast(element.text.trim());
    }
    let mut object = Map::new();
    for child in &element.children {
        let value = element_to_value(child);
        match object.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(child.name.clone(), value);
            }
        }
    }
    Value::Object(object)
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.chars[self.pos..].starts_with(&prefix.chars().collect::<Vec<_>>()[..])
    }

    fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.chars.len());
    }

    fn skip_until(&mut self, terminator: &str) -> Result<(), XmlError> {
        while !self.at_end() {
            if self.starts_with(terminator) {
                self.advance(terminator.chars().count());
                return Ok(());
            }
            self.advance(1);
        }
        Err(XmlError::UnexpectedEnd)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance(1);
        }
    }

    /// Skips prologs, comments, doctype declarations and whitespace.
    fn skip_misc(&mut self) {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                if self.skip_until("?>").is_err() {
                    return;
                }
            } else if self.starts_with("<!--") {
                if self.skip_until("-->").is_err() {
                    return;
                }
            } else if self.starts_with("<!") {
                if self.skip_until(">").is_err() {
                    return;
                }
            } else {
                return;
            }
        }
    }

    fn read_name(&mut self) -> Result<String, XmlError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '>' | '/' | '=') {
                break;
            }
            name.push(c);
            self.advance(1);
        }
        if name.is_empty() {
            return Err(XmlError::Malformed("empty tag name".to_string()));
        }
        Ok(name)
    }

    fn read_element(&mut self) -> Result<XmlElement, XmlError> {
        if self.peek() != Some('<') {
            return Err(XmlError::Malformed("expected '<'".to_string()));
        }
        self.advance(1);
        let qualified = self.read_name()?;
        let (prefix, name) = split_qualified(&qualified);

        let mut element = XmlElement { name, prefix, ..XmlElement::default() };

        // Attributes until '>' or '/>'.
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('/') => {
                    self.advance(1);
                    if self.peek() != Some('>') {
                        return Err(XmlError::Malformed("expected '/>'".to_string()));
                    }
                    self.advance(1);
                    return Ok(element);
                }
                Some('>') => {
                    self.advance(1);
                    break;
                }
                Some(_) => {
                    let attr_name = self.read_name()?;
                    self.skip_whitespace();
                    if self.peek() != Some('=') {
                        return Err(XmlError::Malformed(format!(
                            "attribute '{}' has no value",
                            attr_name
                        )));
                    }
                    self.advance(1);
                    self.skip_whitespace();
                    let value = self.read_quoted()?;
                    if attr_name == "xmlns" {
                        element.namespaces.push((None, value));
                    } else if let Some(ns_prefix) = attr_name.strip_prefix("xmlns:") {
                        element.namespaces.push((Some(ns_prefix.to_string()), value));
                    } else {
                        element.attributes.push((attr_name, value));
                    }
                }
                None => return Err(XmlError::UnexpectedEnd),
            }
        }

        // Content: text and child elements until the matching closing tag.
        loop {
            if self.at_end() {
                return Err(XmlError::UnexpectedEnd);
            }
            if self.starts_with("</") {
                self.advance(2);
                let closing = self.read_name()?;
                self.skip_whitespace();
                if self.peek() != Some('>') {
                    return Err(XmlError::Malformed("unterminated closing tag".to_string()));
                }
                self.advance(1);
                if closing != qualified {
                    return Err(XmlError::MismatchedClosingTag {
                        expected: qualified,
                        found: closing,
                    });
                }
                return Ok(element);
            }
            if self.starts_with("<!--") {
                self.skip_until("-->")?;
                continue;
            }
            if self.peek() == Some('<') {
                element.children.push(self.read_element()?);
                continue;
            }
            let c = self.peek().ok_or(XmlError::UnexpectedEnd)?;
            element.text.push(c);
            self.advance(1);
        }
    }

    fn read_quoted(&mut self) -> Result<String, XmlError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(XmlError::Malformed("expected quoted attribute value".to_string())),
        };
        self.advance(1);
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance(1);
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.advance(1);
                }
                None => return Err(XmlError::UnexpectedEnd),
            }
        }
    }
}

fn split_qualified(qualified: &str) -> (Option<String>, String) {
    match qualified.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qualified.to_string()),
    }
}
