//! Framecut Core - Foundation types for the timeline
//!
//! This crate provides the fundamental types shared by every framecut crate:
//! - Frame arithmetic (FrameRange, FrameRate, RationalTime)
//! - Timecode formatting
//! - The core error type

pub mod error;
pub mod time;

pub use error::{CoreError, Result};
pub use time::{FrameRange, FrameRate, RationalTime, TimecodeFormat};

/// Frame limits shared by the timeline and the preview cache.
pub mod limits {
    /// Default addressable range of a track: 24 hours at 25 fps.
    pub const DEFAULT_MAX_FRAME: i64 = 24 * 60 * 60 * 25;

    /// Default preview chunk size in frames.
    pub const DEFAULT_CHUNK_SIZE: i64 = 25;
}
