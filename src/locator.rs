use crate::types::json_path::escape_segment;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// A 1-based line/column position in the specification source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

/// Maps RFC 6901 pointers to source positions in the raw JSON text the
/// specification was parsed from.
///
/// `serde_json` drops spans during parsing, so the locator re-scans the
/// source once and records where every object key and every value begins.
/// Validators consult it to stamp `SpecLine`/`SpecCol` on errors. A locator
/// is optional: documents handed over as an already-parsed `Value` simply
/// report position (0, 0).
#[derive(Debug, Default)]
pub struct SpecLocator {
    keys: HashMap<String, Location>,
    values: HashMap<String, Location>,
}

impl SpecLocator {
    pub fn from_json_text(text: &str) -> Result<Self, LocatorError> {
        let mut locator = SpecLocator::default();
        let mut scanner = Scanner::new(text);
        scanner.skip_whitespace();
        let mut pointer = String::new();
        scanner.scan_value(&mut pointer, &mut locator)?;
        scanner.skip_whitespace();
        if !scanner.at_end() {
            return Err(scanner.error("trailing characters after the document"));
        }
        Ok(locator)
    }

    /// Position of the key naming the node at `pointer`, falling back to the
    /// value position for array elements and the document root.
    pub fn key(&self, pointer: &str) -> Option<Location> {
        self.keys.get(pointer).copied().or_else(|| self.value(pointer))
    }

    /// Position of the first character of the value at `pointer`.
    pub fn value(&self, pointer: &str) -> Option<Location> {
        self.values.get(pointer).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug)]
pub struct LocatorError {
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl Display for LocatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Malformed JSON at line {}, column {}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for LocatorError {}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, line: 1, col: 1 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn location(&self) -> Location {
        Location { line: self.line, col: self.col }
    }

    fn error(&self, message: impl Into<String>) -> LocatorError {
        LocatorError { line: self.line, col: self.col, message: message.into() }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LocatorError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn scan_value(
        &mut self,
        pointer: &mut String,
        locator: &mut SpecLocator,
    ) -> Result<(), LocatorError> {
        locator.values.insert(pointer.clone(), self.location());
        match self.peek() {
            Some('{') => self.scan_object(pointer, locator),
            Some('[') => self.scan_array(pointer, locator),
            Some('"') => self.scan_string().map(|_| ()),
            Some('t') => self.scan_literal("true"),
            Some('f') => self.scan_literal("false"),
            Some('n') => self.scan_literal("null"),
            Some(c) if c == '-' || c.is_ascii_digit() => self.scan_number(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn scan_object(
        &mut self,
        pointer: &mut String,
        locator: &mut SpecLocator,
    ) -> Result<(), LocatorError> {
        self.expect('{')?;
        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.bump();
            return Ok(());
        }
        loop {
            self.skip_whitespace();
            let key_location = self.location();
            let key = self.scan_string()?;
            self.skip_whitespace();
            self.expect(':')?;
            self.skip_whitespace();

            let saved = pointer.len();
            pointer.push('/');
            pointer.push_str(&escape_segment(&key));
            locator.keys.insert(pointer.clone(), key_location);
            self.scan_value(pointer, locator)?;
            pointer.truncate(saved);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(()),
                Some(c) => return Err(self.error(format!("expected ',' or '}}', found '{}'", c))),
                None => return Err(self.error("unterminated object")),
            }
        }
    }

    fn scan_array(
        &mut self,
        pointer: &mut String,
        locator: &mut SpecLocator,
    ) -> Result<(), LocatorError> {
        self.expect('[')?;
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(());
        }
        let mut index = 0usize;
        loop {
            self.skip_whitespace();
            let saved = pointer.len();
            pointer.push('/');
            pointer.push_str(&index.to_string());
            self.scan_value(pointer, locator)?;
            pointer.truncate(saved);
            index += 1;

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(()),
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{}'", c))),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn scan_string(&mut self) -> Result<String, LocatorError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('/') => out.push('/'),
                    Some('b') => out.push('\u{0008}'),
                    Some('f') => out.push('\u{000C}'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('u') => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = self
                                .bump()
                                .and_then(|c| c.to_digit(16))
                                .ok_or_else(|| self.error("invalid \\u escape"))?;
                            code = code * 16 + digit;
                        }
                        // Surrogate pairs are not recombined; keys containing
                        // them do not occur in OpenAPI documents.
                        out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                    }
                    Some(c) => return Err(self.error(format!("invalid escape '\\{}'", c))),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn scan_literal(&mut self, literal: &str) -> Result<(), LocatorError> {
        for expected in literal.chars() {
            match self.bump() {
                Some(c) if c == expected => {}
                _ => return Err(self.error(format!("invalid literal, expected '{}'", literal))),
            }
        }
        Ok(())
    }

    fn scan_number(&mut self) -> Result<(), LocatorError> {
        if self.peek() == Some('-') {
            self.bump();
        }
        let mut seen_digit = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-') {
                seen_digit = seen_digit || c.is_ascii_digit();
                self.bump();
            } else {
                break;
            }
        }
        if seen_digit {
            Ok(())
        } else {
            Err(self.error("invalid number"))
        }
    }
}
