//! Preview cache configuration.

use std::path::PathBuf;

use framecut_core::{limits, FrameRate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Frames per chunk.
    pub chunk_size: i64,
    /// Directory under which each document gets its own cache folder.
    pub cache_root: PathBuf,
    /// File extension of rendered chunk files.
    pub extension: String,
    /// Rate used to express chunk bounds in seconds.
    pub frame_rate: FrameRate,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            chunk_size: limits::DEFAULT_CHUNK_SIZE,
            cache_root: std::env::temp_dir().join("framecut-preview"),
            extension: "mp4".into(),
            frame_rate: FrameRate::default(),
        }
    }
}
