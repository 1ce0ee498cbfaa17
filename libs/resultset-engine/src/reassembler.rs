use std::sync::Arc;

use resultset_api::{Chunk, RawRow, RawValue};

use crate::buffer::ChunkBuffer;
use crate::error::ReassemblyError;
use crate::merge::{MergePolicy, merge};
use crate::row_type::{RowType, display_name};

/// Mutable reassembly state, owned by exactly one reassembler.
#[derive(Debug, Default)]
struct ReassemblerState {
    /// Rows that reached the field count and were superseded by a newer row.
    complete: Vec<RawRow>,
    /// Row currently being filled. May be full until the next append or flush.
    current: Vec<RawValue>,
    /// Trailing incomplete value of the last chunk, kept only while that
    /// chunk's `chunked_value` flag asks for a continuation.
    residual: Option<RawValue>,
}

/// Turns a sequence of chunks into complete rows.
///
/// Values are appended to rows in field order; a new row starts when the
/// current one holds one value per field. A value split across a chunk
/// boundary is held back as the residual and merged with the first value
/// of the next chunk, using the declared type of the field it belongs to.
pub struct RowReassembler {
    row_type: Arc<RowType>,
    policy: MergePolicy,
    state: ReassemblerState,
}

impl std::fmt::Debug for RowReassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowReassembler")
            .field("fields", &self.row_type.len())
            .field("policy", &self.policy)
            .field("complete", &self.state.complete.len())
            .field("partial", &self.state.current.len())
            .field("residual", &self.state.residual.is_some())
            .finish()
    }
}

impl RowReassembler {
    pub fn new(row_type: Arc<RowType>, policy: MergePolicy) -> Self {
        Self {
            row_type,
            policy,
            state: ReassemblerState::default(),
        }
    }

    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Merge one chunk into the row state.
    ///
    /// A stream error leaves the state unusable; the reassembler must be
    /// discarded together with the stream.
    pub fn ingest_chunk(&mut self, chunk: Chunk) -> Result<(), ReassemblyError> {
        let Chunk {
            values,
            chunked_value,
            ..
        } = chunk;
        let erased = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                RawValue::try_from(value).map_err(|e| {
                    ReassemblyError::SchemaMismatch(format!("chunk value {i}: {}", e.message))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut incoming = erased.into_iter();
        let mut ready = Vec::with_capacity(incoming.len() + 1);

        if let Some(head) = self.state.residual.take() {
            match incoming.next() {
                Some(tail) => {
                    let position = self.next_position();
                    let column = self.row_type.column(position).ok_or_else(|| {
                        ReassemblyError::SchemaMismatch(format!(
                            "position {position} has no declared field"
                        ))
                    })?;
                    let name = display_name(&column.name);
                    tracing::trace!(field = %name, position, "merging chunked value");
                    ready.extend(merge(&self.row_type, column.ty, head, tail, self.policy, name)?);
                }
                // Empty chunk: the value is still waiting for its continuation.
                None => ready.push(head),
            }
        }
        ready.extend(incoming);

        if chunked_value {
            self.state.residual = ready.pop();
        }
        for value in ready {
            self.append(value);
        }
        Ok(())
    }

    /// Ingest every buffered chunk in order, then flush.
    pub fn reassemble(&mut self, buffer: &mut ChunkBuffer) -> Result<Vec<RawRow>, ReassemblyError> {
        while let Some(chunk) = buffer.pop() {
            self.ingest_chunk(chunk)?;
        }
        Ok(self.flush())
    }

    /// Hand out every complete row.
    ///
    /// A trailing partial row stays behind and keeps filling on the next
    /// `ingest_chunk`. A second flush without new chunks returns nothing.
    pub fn flush(&mut self) -> Vec<RawRow> {
        if self.state.current.len() == self.row_type.len() {
            let row = std::mem::take(&mut self.state.current);
            self.state.complete.push(RawRow(row));
        }
        std::mem::take(&mut self.state.complete)
    }

    /// Values held in the retained partial row.
    pub fn partial_len(&self) -> usize {
        if self.state.current.len() == self.row_type.len() {
            0
        } else {
            self.state.current.len()
        }
    }

    pub fn has_residual(&self) -> bool {
        self.state.residual.is_some()
    }

    /// True when no row is partially filled and no value awaits a continuation.
    pub fn at_row_boundary(&self) -> bool {
        self.partial_len() == 0 && !self.has_residual()
    }

    fn append(&mut self, value: RawValue) {
        let width = self.row_type.len();
        if self.state.current.len() == width {
            let row = std::mem::replace(&mut self.state.current, Vec::with_capacity(width));
            self.state.complete.push(RawRow(row));
        }
        self.state.current.push(value);
    }

    /// Field index the next appended value lands in.
    fn next_position(&self) -> usize {
        self.state.current.len() % self.row_type.len()
    }
}
