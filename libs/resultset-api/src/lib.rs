pub mod chunk;
pub mod decode;
pub mod error;
pub mod schema;
pub mod value;

pub use chunk::{Chunk, ResultSetStats};
pub use decode::{ScalarDecoder, WireDecoder};
pub use error::{DecodeError, ErrorKind};
pub use schema::{Field, FieldType, ResultSetMetadata, StructType, TypeCode};
pub use value::{JsonOptions, RawRow, RawValue, Value, WireValue};
