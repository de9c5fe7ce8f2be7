//! Render request/completion protocol between the manager and a render engine.
//!
//! The manager hands out [`RenderRequest`]s; the engine renders each chunk on
//! its own threads and reports back with [`RenderEvent`]s on a channel. A
//! ticket ties each report to the request it answers, so reports for a chunk
//! that was invalidated in the meantime are recognised as stale.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framecut_core::{FrameRange, RationalTime};
use serde::{Deserialize, Serialize};

/// Identifies one render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RenderTicket(pub u64);

/// Handle for cancelling in-progress chunk renders.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One chunk to render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub chunk: i64,
    pub range: FrameRange,
    /// `range` in seconds, for engines that seek by time.
    pub start: RationalTime,
    pub end: RationalTime,
    pub ticket: RenderTicket,
    /// Where the engine should write the result.
    pub output: PathBuf,
    pub cancel: CancelToken,
}

/// Progress report from the render engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Started {
        chunk: i64,
        ticket: RenderTicket,
    },
    Completed {
        chunk: i64,
        ticket: RenderTicket,
    },
    Failed {
        chunk: i64,
        ticket: RenderTicket,
        reason: String,
    },
}

impl RenderEvent {
    pub fn chunk(&self) -> i64 {
        match self {
            Self::Started { chunk, .. }
            | Self::Completed { chunk, .. }
            | Self::Failed { chunk, .. } => *chunk,
        }
    }

    pub fn ticket(&self) -> RenderTicket {
        match self {
            Self::Started { ticket, .. }
            | Self::Completed { ticket, .. }
            | Self::Failed { ticket, .. } => *ticket,
        }
    }
}
