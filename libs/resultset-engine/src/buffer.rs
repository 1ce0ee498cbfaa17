use std::collections::VecDeque;

use resultset_api::Chunk;

/// FIFO of chunks delivered by the transport and not yet reassembled.
///
/// Pure sequencing: no merge logic lives here.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: VecDeque<Chunk>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: Chunk) {
        self.chunks.push_back(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Take the oldest buffered chunk.
    pub fn pop(&mut self) -> Option<Chunk> {
        self.chunks.pop_front()
    }
}
