use std::fmt;

/// Error kind for scalar decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wire value has the wrong shape or does not parse.
    Format,
    /// Value parses but does not fit the target representation.
    Range,
    /// Type code the decoder does not handle.
    Unsupported,
}

/// Error returned by every `ScalarDecoder`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DecodeError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Range, message: msg.into() }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Unsupported, message: msg.into() }
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DecodeError {}

// ---------------------------------------------------------------------------
// From impls: parser error types → DecodeError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::format(e.to_string())
    }
}

impl From<base64::DecodeError> for DecodeError {
    fn from(e: base64::DecodeError) -> Self {
        Self::format(e.to_string())
    }
}

impl From<chrono::ParseError> for DecodeError {
    fn from(e: chrono::ParseError) -> Self {
        Self::format(e.to_string())
    }
}

impl From<std::num::ParseIntError> for DecodeError {
    fn from(e: std::num::ParseIntError) -> Self {
        match e.kind() {
            std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
                Self::range(e.to_string())
            }
            _ => Self::format(e.to_string()),
        }
    }
}
