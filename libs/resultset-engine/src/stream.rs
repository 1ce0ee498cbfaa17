use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;

use resultset_api::{Chunk, ResultSetStats, ScalarDecoder, WireDecoder};

use crate::buffer::ChunkBuffer;
use crate::config::StreamConfig;
use crate::error::ReassemblyError;
use crate::format::{FormattedRow, RowFormatter};
use crate::reassembler::RowReassembler;
use crate::row_type::RowType;

/// Error reported by the transport that delivers chunks.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Transport side of a [`ResultStream`].
pub type ChunkSender = mpsc::Sender<Result<Chunk, TransportError>>;

/// Reassembler and formatter, bound once the row type is known.
struct Bound {
    reassembler: RowReassembler,
    formatter: RowFormatter,
}

/// Rows of one query, reassembled from the chunks a transport delivers.
///
/// The transport pushes chunks (or a terminal error) into the channel and
/// drops its sender at end of stream. The first chunk must carry the result
/// metadata. Rows are handed out one at a time, in stream order; the first
/// error ends the stream.
pub struct ResultStream {
    rx: mpsc::Receiver<Result<Chunk, TransportError>>,
    config: StreamConfig,
    decoder: Arc<dyn ScalarDecoder>,
    buffer: ChunkBuffer,
    bound: Option<Bound>,
    ready: VecDeque<FormattedRow>,
    resume_token: Option<Vec<u8>>,
    stats: Option<ResultSetStats>,
    chunks: u64,
    done: bool,
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("chunks", &self.chunks)
            .field("ready", &self.ready.len())
            .field("done", &self.done)
            .finish()
    }
}

impl ResultStream {
    pub fn new(rx: mpsc::Receiver<Result<Chunk, TransportError>>, config: StreamConfig) -> Self {
        Self {
            rx,
            config,
            decoder: Arc::new(WireDecoder),
            buffer: ChunkBuffer::new(),
            bound: None,
            ready: VecDeque::new(),
            resume_token: None,
            stats: None,
            chunks: 0,
            done: false,
        }
    }

    /// Create a stream together with the sender its transport feeds.
    pub fn channel(config: StreamConfig) -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        (tx, Self::new(rx, config))
    }

    /// Replace the scalar decoder. Takes effect when the row type is bound.
    pub fn with_decoder(mut self, decoder: Arc<dyn ScalarDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Row type of the stream, once the first chunk has arrived.
    pub fn row_type(&self) -> Option<&Arc<RowType>> {
        self.bound.as_ref().map(|b| b.reassembler.row_type())
    }

    /// Latest resume token received at a row boundary. Every row before it
    /// has been reassembled; a transport restarting from it loses nothing.
    pub fn last_resume_token(&self) -> Option<&[u8]> {
        self.resume_token.as_deref()
    }

    /// Statistics from the final message, if the stream sent them.
    pub fn stats(&self) -> Option<&ResultSetStats> {
        self.stats.as_ref()
    }

    /// Next complete row, `None` at end of stream or after an error.
    pub async fn next_row(&mut self) -> Option<Result<FormattedRow, ReassemblyError>> {
        loop {
            if let Some(row) = self.ready.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }

            let outcome = match self.rx.recv().await {
                Some(Ok(chunk)) => self.on_chunk(chunk),
                Some(Err(e)) => {
                    tracing::error!(chunks = self.chunks, error = %e, "transport error");
                    Err(ReassemblyError::Transport(e))
                }
                None => {
                    self.done = true;
                    self.finish()
                }
            };
            if let Err(e) = outcome {
                self.done = true;
                self.ready.clear();
                return Some(Err(e));
            }
        }
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<FormattedRow>, ReassemblyError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn on_chunk(&mut self, mut chunk: Chunk) -> Result<(), ReassemblyError> {
        self.chunks += 1;

        if self.bound.is_none() {
            let metadata = chunk.metadata.take().ok_or(ReassemblyError::MissingMetadata)?;
            let row_type = Arc::new(RowType::from_metadata(&metadata)?);
            tracing::debug!(fields = row_type.len(), "bound result row type");
            self.bound = Some(Bound {
                reassembler: RowReassembler::new(row_type.clone(), self.config.merge_policy),
                formatter: RowFormatter::with_decoder(row_type, self.decoder.clone()),
            });
        } else if chunk.metadata.is_some() {
            tracing::warn!(chunk = self.chunks, "ignoring metadata on a later chunk");
        }

        if let Some(stats) = chunk.stats.take() {
            self.stats = Some(stats);
        }
        let token = chunk.resume_token.take();

        tracing::debug!(
            chunk = self.chunks,
            values = chunk.values.len(),
            chunked = chunk.chunked_value,
            "received chunk"
        );
        self.buffer.append(chunk);

        let Some(bound) = self.bound.as_mut() else {
            return Err(ReassemblyError::MissingMetadata);
        };
        let rows = bound.reassembler.reassemble(&mut self.buffer)?;
        let formatted = bound.formatter.format_batch(&rows)?;
        if !formatted.is_empty() {
            tracing::debug!(chunk = self.chunks, rows = formatted.len(), "rows completed");
        }
        self.ready.extend(formatted);

        if token.is_some() && bound.reassembler.at_row_boundary() {
            self.resume_token = token;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReassemblyError> {
        let Some(bound) = self.bound.as_ref() else {
            tracing::debug!("stream ended before any chunk");
            return Ok(());
        };
        let reassembler = &bound.reassembler;
        if !reassembler.at_row_boundary() {
            tracing::warn!(
                values = reassembler.partial_len(),
                pending = reassembler.has_residual(),
                "stream ended mid-row"
            );
            return Err(ReassemblyError::IncompleteStream {
                values: reassembler.partial_len(),
                fields: reassembler.row_type().len(),
                pending: reassembler.has_residual(),
            });
        }
        tracing::debug!(chunks = self.chunks, "stream finished");
        Ok(())
    }
}
