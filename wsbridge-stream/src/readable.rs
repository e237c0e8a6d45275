//! Read-side buffer of the duplex stream.
//!
//! Chunks pushed by the adapter wait here until the consumer reads them.
//! The buffer is accounted in bytes against a high water mark; a push that
//! leaves the buffer at or above the mark reports "full" so the producer can
//! stop delivering.

use bytes::Bytes;
use std::collections::VecDeque;

#[derive(Debug)]
pub(crate) struct ReadBuffer {
    chunks: VecDeque<Bytes>,
    /// Buffered bytes
    len: usize,
    high_water_mark: usize,
    /// End-of-data was pushed
    ended: bool,
    /// The consumer has observed end-of-data
    end_emitted: bool,
}

impl ReadBuffer {
    pub(crate) fn new(high_water_mark: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            len: 0,
            high_water_mark,
            ended: false,
            end_emitted: false,
        }
    }

    /// Buffer a chunk. Returns false when the producer should hold off.
    ///
    /// Zero-length chunks carry nothing to read and are not buffered.
    pub(crate) fn push(&mut self, chunk: Bytes) -> bool {
        if self.ended {
            return false;
        }
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push_back(chunk);
        }
        self.len < self.high_water_mark || self.len == 0
    }

    pub(crate) fn push_eof(&mut self) {
        self.ended = true;
    }

    pub(crate) fn pop(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.len -= chunk.len();
        Some(chunk)
    }

    /// End-of-data was pushed and every chunk has been read.
    #[inline]
    pub(crate) fn is_drained(&self) -> bool {
        self.ended && self.chunks.is_empty()
    }

    /// More data may still come and there is room for it. An empty buffer
    /// always has room, even with a zero high water mark.
    #[inline]
    pub(crate) fn wants_more(&self) -> bool {
        !self.ended && (self.len < self.high_water_mark || self.len == 0)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_ended(&self) -> bool {
        self.ended
    }

    #[inline]
    pub(crate) fn end_emitted(&self) -> bool {
        self.end_emitted
    }

    pub(crate) fn mark_end_emitted(&mut self) {
        self.end_emitted = true;
    }
}
