// ABOUTME: Bounded, order-preserving store of a channel's past output
// Oldest chunks are evicted whole once the byte budget is exceeded

use crate::ansi::strip_leading_clear;
use std::collections::VecDeque;

/// Default per-channel budget: 5 MiB
pub const DEFAULT_HISTORY_BUDGET: usize = 5 * 1024 * 1024;

/// Append-only chunk history capped at a byte budget.
///
/// Chunks are never split. A single chunk larger than the budget is kept on its
/// own until the next append evicts it.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    chunks: VecDeque<Vec<u8>>,
    total_bytes: usize,
    budget: usize,
}

impl HistoryBuffer {
    pub const fn new(budget: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_bytes: 0,
            budget,
        }
    }

    pub fn append(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_bytes += chunk.len();
        self.chunks.push_back(chunk);

        while self.total_bytes > self.budget && self.chunks.len() > 1 {
            if let Some(evicted) = self.chunks.pop_front() {
                self.total_bytes -= evicted.len();
            }
        }
    }

    /// Copy of the retained chunks, oldest first
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.chunks.iter().cloned().collect()
    }

    /// Chunks to replay when the channel regains focus.
    ///
    /// The first chunk loses any leading clear/home sequences (dropped entirely if
    /// nothing else remains); every later chunk is returned untouched.
    pub fn replay(&self) -> Vec<Vec<u8>> {
        let mut chunks = self.chunks.iter();
        let mut replay = Vec::with_capacity(self.chunks.len());
        if let Some(first) = chunks.next() {
            let first = strip_leading_clear(first);
            if !first.is_empty() {
                replay.push(first.to_vec());
            }
        }
        replay.extend(chunks.cloned());
        replay
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().map(Vec::as_slice)
    }

    pub const fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub const fn budget(&self) -> usize {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_BUDGET)
    }
}
