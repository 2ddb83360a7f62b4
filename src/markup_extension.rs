//! Compact-syntax parsing for attribute values of the form `{Ext arg, Name=value}`
//!
//! A value starting with `{` is a markup extension unless it starts with the
//! `{}` escape, in which case the remainder is literal text.

use crate::error::{CompilerError, Result};
use crate::types::{ExtensionTypeId, MAX_EXTENSION_NESTING};
use std::fmt;

/// A parsed `{TypeName ...}` expression
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupExtension {
    /// Type name as written, including any prefix (`x:Type`)
    pub type_name: String,
    pub args: Vec<ExtensionArg>,
    /// Argument text with the `{TypeName` prefix and closing brace stripped
    pub raw_args: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionArg {
    Positional(ExtensionValue),
    Named(String, ExtensionValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    Text(String),
    Extension(Box<MarkupExtension>),
}

impl MarkupExtension {
    pub fn extension_type_id(&self) -> ExtensionTypeId {
        ExtensionTypeId::from_name(&self.type_name)
    }

    /// Namespace prefix of the type name, empty for the default namespace
    pub fn prefix(&self) -> &str {
        match self.type_name.split_once(':') {
            Some((prefix, _)) => prefix,
            None => "",
        }
    }

    pub fn positional(&self) -> impl Iterator<Item = &ExtensionValue> {
        self.args.iter().filter_map(|arg| match arg {
            ExtensionArg::Positional(value) => Some(value),
            ExtensionArg::Named(..) => None,
        })
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &ExtensionValue)> {
        self.args.iter().filter_map(|arg| match arg {
            ExtensionArg::Named(name, value) => Some((name.as_str(), value)),
            ExtensionArg::Positional(_) => None,
        })
    }

    /// At most one positional text argument and nothing else
    pub fn is_simple(&self) -> bool {
        match self.args.as_slice() {
            [] => true,
            [ExtensionArg::Positional(ExtensionValue::Text(_))] => true,
            _ => false,
        }
    }

    /// The single positional argument when it is itself an extension with simple args
    pub fn nested_simple_extension(&self) -> Option<&MarkupExtension> {
        match self.args.as_slice() {
            [ExtensionArg::Positional(ExtensionValue::Extension(inner))] if inner.is_simple() => {
                Some(inner)
            }
            _ => None,
        }
    }

    /// Text of the first positional argument, if it is plain text
    pub fn first_text_arg(&self) -> Option<&str> {
        match self.positional().next() {
            Some(ExtensionValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for MarkupExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw_args.is_empty() {
            write!(f, "{{{}}}", self.type_name)
        } else {
            write!(f, "{{{} {}}}", self.type_name, self.raw_args)
        }
    }
}

/// True when `value` must be expanded as a markup extension
pub fn is_compact_syntax(value: &str) -> bool {
    let trimmed = value.trim_start();
    trimmed.starts_with('{') && !trimmed.starts_with("{}")
}

/// Strip the `{}` escape from a literal attribute value
pub fn unescape_literal(value: &str) -> &str {
    value.strip_prefix("{}").unwrap_or(value)
}

/// Parse a compact-syntax attribute value
pub fn parse(text: &str) -> Result<MarkupExtension> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut parser = ExtensionParser { chars, pos: 0 };
    let extension = parser.parse_extension(0)?;

    parser.skip_whitespace();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("Unexpected text after closing '}'"));
    }
    Ok(extension)
}

struct ExtensionParser {
    chars: Vec<char>,
    pos: usize,
}

impl ExtensionParser {
    fn error(&self, message: &str) -> CompilerError {
        CompilerError::InvalidFormat {
            message: format!("{} in markup extension at offset {}", message, self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_extension(&mut self, nesting: usize) -> Result<MarkupExtension> {
        if nesting >= MAX_EXTENSION_NESTING {
            return Err(CompilerError::LimitExceeded {
                limit_type: "markup extension nesting".to_string(),
                limit: MAX_EXTENSION_NESTING,
            });
        }

        if self.peek() != Some('{') {
            return Err(self.error("Expected '{'"));
        }
        self.pos += 1;
        self.skip_whitespace();

        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if !c.is_whitespace() && c != '}' && c != ',') {
            self.pos += 1;
        }
        if self.pos == name_start {
            return Err(self.error("Missing extension type name"));
        }
        let type_name: String = self.chars[name_start..self.pos].iter().collect();

        self.skip_whitespace();
        let args_start = self.pos;
        let mut args = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("Unterminated markup extension")),
                Some('}') => break,
                _ => {}
            }

            args.push(self.parse_arg(nesting)?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => break,
                None => return Err(self.error("Unterminated markup extension")),
                Some(_) => return Err(self.error("Expected ',' or '}'")),
            }
        }

        let raw_args: String = self.chars[args_start..self.pos].iter().collect::<String>().trim().to_string();
        self.pos += 1;

        Ok(MarkupExtension {
            type_name,
            args,
            raw_args,
        })
    }

    fn parse_arg(&mut self, nesting: usize) -> Result<ExtensionArg> {
        if self.peek() == Some('{') {
            let nested = self.parse_extension(nesting + 1)?;
            return Ok(ExtensionArg::Positional(ExtensionValue::Extension(Box::new(nested))));
        }

        let text = self.parse_text()?;
        self.skip_whitespace();

        if self.peek() != Some('=') {
            return Ok(ExtensionArg::Positional(ExtensionValue::Text(text)));
        }
        self.pos += 1;
        self.skip_whitespace();

        if text.is_empty() {
            return Err(self.error("Missing property name before '='"));
        }

        let value = if self.peek() == Some('{') && !self.starts_with_escape() {
            ExtensionValue::Extension(Box::new(self.parse_extension(nesting + 1)?))
        } else {
            if self.starts_with_escape() {
                self.pos += 2;
            }
            ExtensionValue::Text(self.parse_text()?)
        };

        Ok(ExtensionArg::Named(text, value))
    }

    fn starts_with_escape(&self) -> bool {
        self.peek() == Some('{') && self.chars.get(self.pos + 1) == Some(&'}')
    }

    /// Text up to the next unquoted ',', '=', or '}'. Quotes and backslash escapes are removed.
    fn parse_text(&mut self) -> Result<String> {
        let mut out = String::new();
        let mut quote: Option<char> = None;

        while let Some(c) = self.peek() {
            match (quote, c) {
                (_, '\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(escaped) => out.push(escaped),
                        None => return Err(self.error("Dangling escape character")),
                    }
                }
                (Some(q), c) if c == q => quote = None,
                (Some(_), c) => out.push(c),
                (None, '\'') | (None, '"') if out.trim().is_empty() => quote = Some(c),
                (None, ',') | (None, '=') | (None, '}') => break,
                (None, '{') => return Err(self.error("Unexpected '{' inside argument text")),
                (None, c) => out.push(c),
            }
            self.pos += 1;
        }

        if quote.is_some() {
            return Err(self.error("Unterminated quoted string"));
        }
        Ok(out.trim().to_string())
    }
}
