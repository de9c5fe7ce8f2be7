//! User-facing timeline settings, stored as JSON.

use std::path::Path;

use framecut_core::{CoreError, Result};
use framecut_preview::PreviewConfig;
use framecut_timeline::TimelineConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Narrowest track header the view accepts.
pub const MIN_HEADER_WIDTH: i32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Magnetic item boundaries while moving.
    pub snap_to_points: bool,
    /// Show plain frame numbers instead of timecodes.
    pub frame_timecode: bool,
    pub header_width: i32,
    /// Gap length the spacer dialog proposes, in frames.
    pub spacer_default_duration: i64,
    pub show_thumbnails: bool,
    pub show_audio_thumbnails: bool,
    pub show_markers: bool,
    pub show_waveforms: bool,
    pub preview: PreviewConfig,
    pub timeline: TimelineConfig,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            snap_to_points: true,
            frame_timecode: false,
            header_width: 120,
            spacer_default_duration: 65,
            show_thumbnails: true,
            show_audio_thumbnails: true,
            show_markers: true,
            show_waveforms: true,
            preview: PreviewConfig::default(),
            timeline: TimelineConfig::default(),
        }
    }
}

impl ControllerSettings {
    /// Header width, never below [`MIN_HEADER_WIDTH`].
    pub fn header_width(&self) -> i32 {
        self.header_width.max(MIN_HEADER_WIDTH)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize settings: {e}")))
    }

    /// Parse settings; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Serialization(format!("Failed to parse settings: {e}")))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "settings unreadable, using defaults");
            Self::default()
        })
    }
}
