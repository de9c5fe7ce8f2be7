//! Chunk grid arithmetic.
//!
//! A chunk is identified by its start frame, always a multiple of the chunk
//! size. Chunk `c` covers `[c, c + size)`.

use framecut_core::FrameRange;
use serde::{Deserialize, Serialize};

/// Render state of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkState {
    /// A valid render exists in the cache.
    Rendered,
    /// Needs (re)rendering.
    Dirty,
    /// Handed to the render engine, result not in yet.
    Pending,
}

/// Fixed-size partition of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGrid {
    size: i64,
}

impl ChunkGrid {
    /// Sizes below one frame are raised to one.
    pub fn new(size: i64) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(self) -> i64 {
        self.size
    }

    /// Start of the chunk containing `frame`.
    pub fn chunk_of(self, frame: i64) -> i64 {
        frame.div_euclid(self.size) * self.size
    }

    pub fn range_of(self, chunk: i64) -> FrameRange {
        FrameRange::new(chunk, self.size)
    }

    /// Starts of every chunk intersecting `range`, ascending.
    pub fn chunks_in(self, range: FrameRange) -> impl Iterator<Item = i64> {
        let (first, end, step) = if range.is_empty() {
            (0, 0, self.size)
        } else {
            (self.chunk_of(range.start), range.end(), self.size)
        };
        (0..)
            .map(move |n| first + n * step)
            .take_while(move |chunk| *chunk < end)
    }
}
