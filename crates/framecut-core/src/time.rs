//! Time representation for frame-accurate editing
//!
//! Timeline positions are integer frame numbers. Seconds only appear at the
//! edges (render engines, timecode), through `RationalTime`.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An exact time in seconds, kept as a fraction so NTSC frame boundaries
/// survive conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime(Rational64);

impl RationalTime {
    /// Whole seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        Self(Rational64::from_integer(seconds))
    }

    /// The instant frame `frames` starts at `rate`.
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self(Rational64::new(
            frames * i64::from(rate.denominator),
            i64::from(rate.numerator.max(1)),
        ))
    }

    /// Nearest frame at `rate`; halves round away from zero.
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        let per_second = Rational64::new(
            i64::from(rate.numerator),
            i64::from(rate.denominator.max(1)),
        );
        (self.0 * per_second).round().to_integer()
    }

    pub fn as_secs_f64(self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// How frame numbers are rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimecodeFormat {
    /// Plain frame count.
    Frames,
    /// `HH:MM:SS:FF` at the nominal (rounded) frame rate.
    #[default]
    Smpte,
    /// `HH:MM:SS;FF` drop-frame for NTSC rates, non-drop otherwise.
    SmpteDropFrame,
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Integer frames-per-second used for timecode digits.
    #[inline]
    pub fn nominal_fps(self) -> i64 {
        (self.to_fps_f64().round() as i64).max(1)
    }

    /// True for 1001-based NTSC rates, where drop-frame timecode applies.
    #[inline]
    pub fn is_ntsc(self) -> bool {
        self.denominator == 1001
    }

    /// Render a frame number as a timecode string.
    pub fn timecode(self, frames: i64, format: TimecodeFormat) -> String {
        match format {
            TimecodeFormat::Frames => frames.to_string(),
            TimecodeFormat::Smpte => self.smpte(frames, ':', frames),
            TimecodeFormat::SmpteDropFrame if self.is_ntsc() => {
                let fps = self.nominal_fps();
                // 2 frame numbers dropped per minute at 29.97, 4 at 59.94,
                // except every tenth minute.
                let drop = (fps as f64 * 0.066_666).round() as i64;
                let per_ten_minutes = fps * 600 - drop * 9;
                let per_minute = fps * 60 - drop;
                let abs = frames.abs();
                let tens = abs / per_ten_minutes;
                let rem = abs % per_ten_minutes;
                let mut numbered = abs + drop * 9 * tens;
                if rem > drop {
                    numbered += drop * ((rem - drop) / per_minute);
                }
                self.smpte(numbered * frames.signum(), ';', frames)
            }
            TimecodeFormat::SmpteDropFrame => self.smpte(frames, ':', frames),
        }
    }

    fn smpte(self, numbered: i64, frame_sep: char, original: i64) -> String {
        let fps = self.nominal_fps();
        let sign = if original < 0 { "-" } else { "" };
        let abs = numbered.abs();
        let ff = abs % fps;
        let total_secs = abs / fps;
        format!(
            "{sign}{:02}:{:02}:{:02}{frame_sep}{:02}",
            total_secs / 3600,
            (total_secs / 60) % 60,
            total_secs % 60,
            ff
        )
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_25
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A frame range with inclusive start and exclusive end: `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame (inclusive)
    pub start: i64,
    /// Number of frames
    pub duration: i64,
}

impl FrameRange {
    /// Create a new range from start and duration.
    #[inline]
    pub const fn new(start: i64, duration: i64) -> Self {
        Self { start, duration }
    }

    /// Create a range from start and end frames.
    #[inline]
    pub const fn from_start_end(start: i64, end: i64) -> Self {
        Self {
            start,
            duration: end.saturating_sub(start),
        }
    }

    /// End frame (exclusive). Saturates at `i64::MAX`, so a range that
    /// cannot exist still compares past any track bound.
    #[inline]
    pub const fn end(self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.duration <= 0
    }

    /// Check if a frame is within this range.
    #[inline]
    pub const fn contains(self, frame: i64) -> bool {
        frame >= self.start && frame < self.end()
    }

    /// Check if two ranges share at least one frame.
    pub fn overlaps(self, other: Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end() && other.start < self.end()
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::from_start_end(
            self.start.max(other.start),
            self.end().min(other.end()),
        ))
    }

    /// Smallest range covering both.
    pub fn union_span(self, other: Self) -> Self {
        Self::from_start_end(self.start.min(other.start), self.end().max(other.end()))
    }

    /// The same range moved by `delta` frames, saturating at the `i64` bounds.
    #[inline]
    pub const fn shifted(self, delta: i64) -> Self {
        Self {
            start: self.start.saturating_add(delta),
            duration: self.duration,
        }
    }

    /// Empty range starting at zero.
    pub const EMPTY: Self = Self {
        start: 0,
        duration: 0,
    };
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
