pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod merge;
pub mod reassembler;
pub mod row_type;
pub mod stream;

pub use buffer::ChunkBuffer;
pub use config::StreamConfig;
pub use error::ReassemblyError;
pub use format::{FormattedRow, NamedValue, RowFormatter};
pub use merge::MergePolicy;
pub use reassembler::RowReassembler;
pub use row_type::{Column, RowType, TypeId};
pub use stream::{ChunkSender, ResultStream, TransportError};
