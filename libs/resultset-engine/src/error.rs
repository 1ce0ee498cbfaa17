use resultset_api::DecodeError;

use crate::stream::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    /// A value's position has no declared field, or its shape contradicts it.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("chunked floating point value in '{field}' cannot be merged")]
    InvalidChunkedFloat { field: String },

    #[error("malformed value in field '{field}' (row {row} of batch): {source}")]
    MalformedValue {
        field: String,
        row: usize,
        #[source]
        source: DecodeError,
    },

    #[error("row type declares no fields")]
    EmptyRowType,

    #[error("invalid row type: {0}")]
    InvalidRowType(String),

    #[error("first message of the stream carries no metadata")]
    MissingMetadata,

    #[error("stream ended mid-row: {values} of {fields} values received, pending chunked value: {pending}")]
    IncompleteStream {
        values: usize,
        fields: usize,
        pending: bool,
    },

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("config error: {0}")]
    Config(String),
}

impl ReassemblyError {
    /// Add context to the error.
    ///
    /// For `MalformedValue`, context is added to the inner `DecodeError`.
    /// For message variants, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            ReassemblyError::MalformedValue { field, row, source } => ReassemblyError::MalformedValue {
                field,
                row,
                source: source.with_context(ctx),
            },
            ReassemblyError::SchemaMismatch(msg) => {
                ReassemblyError::SchemaMismatch(format!("{ctx}: {msg}"))
            }
            ReassemblyError::InvalidRowType(msg) => {
                ReassemblyError::InvalidRowType(format!("{ctx}: {msg}"))
            }
            ReassemblyError::Config(msg) => ReassemblyError::Config(format!("{ctx}: {msg}")),
            other => other,
        }
    }

    /// Whether the error is a protocol violation of the stream itself,
    /// as opposed to a transport or local failure.
    pub fn is_stream_fault(&self) -> bool {
        matches!(
            self,
            ReassemblyError::SchemaMismatch(_)
                | ReassemblyError::InvalidChunkedFloat { .. }
                | ReassemblyError::MalformedValue { .. }
                | ReassemblyError::MissingMetadata
                | ReassemblyError::IncompleteStream { .. }
        )
    }
}
