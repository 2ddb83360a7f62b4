//! Error types for the BAML serialization core

use std::fmt;
use thiserror::Error;

/// Location in the markup source, as reported by the tokenizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    /// Element nesting depth at the point of the error
    pub depth: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, depth: usize) -> Self {
        Self { line, column, depth }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (depth {})", self.line, self.column, self.depth)
    }
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Markup error at {position}: {message}")]
    Markup { position: SourcePosition, message: String },

    #[error("Malformed variable-length integer: no terminator after {consumed} bytes")]
    MalformedVarInt { consumed: usize },

    #[error("Unknown {what} discriminator 0x{value:02X}")]
    UnknownDiscriminator { what: &'static str, value: u8 },

    #[error("Record payload length mismatch for {record}: declared {declared}, consumed {consumed}")]
    PayloadLengthMismatch { record: String, declared: usize, consumed: usize },

    #[error("{serializer} does not support custom binary serialization")]
    UnsupportedCustomSerialization { serializer: &'static str },

    #[error("Stack contract violation: {operation} on empty parser stack")]
    EmptyStack { operation: &'static str },

    #[error("Style mode contract violation: {operation} below the Base floor (depth {depth})")]
    StyleModeFloor { operation: &'static str, depth: usize },

    #[error("Maximum limit exceeded: {limit_type} (limit: {limit})")]
    LimitExceeded { limit_type: String, limit: usize },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn markup(position: SourcePosition, message: impl Into<String>) -> Self {
        Self::Markup {
            position,
            message: message.into(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Attach a source position to errors that carry none
    pub fn at(self, position: SourcePosition) -> Self {
        match self {
            Self::Markup { .. } => self,
            other => Self::Markup {
                position,
                message: other.to_string(),
            },
        }
    }

    /// True for errors the caller recovers from by emitting a text record instead
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnsupportedCustomSerialization { .. })
    }
}
