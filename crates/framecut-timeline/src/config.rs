//! Timeline model configuration.

use framecut_core::{limits, FrameRate};
use serde::{Deserialize, Serialize};

/// Settings that shape a `TimelineItemModel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Addressable length of every track, in frames.
    pub max_frame: i64,
    /// Length given to clips whose source has no intrinsic duration.
    pub default_clip_duration: i64,
    pub default_composition_duration: i64,
    /// Maximum number of undo steps kept.
    pub undo_depth: usize,
    pub frame_rate: FrameRate,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_frame: limits::DEFAULT_MAX_FRAME,
            default_clip_duration: 125,
            default_composition_duration: 100,
            undo_depth: 200,
            frame_rate: FrameRate::FPS_25,
        }
    }
}
