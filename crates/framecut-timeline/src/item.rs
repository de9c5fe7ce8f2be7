//! Placed timeline items: clips and compositions.

use framecut_core::FrameRange;
use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, TrackId};

/// Reference to an entry of the external media catalog (bin id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn new(bin_id: impl Into<String>) -> Self {
        Self(bin_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Audio channel layout of a media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelLayout {
    #[default]
    None,
    Mono,
    Stereo,
    Surround51,
}

/// What the media catalog knows about a resolved source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    /// Length in frames; `None` for sources without intrinsic length (stills, colors).
    pub duration: Option<i64>,
    pub channels: ChannelLayout,
    pub has_video: bool,
}

impl MediaHandle {
    /// A video source with a stereo soundtrack.
    pub fn av(duration: i64) -> Self {
        Self {
            duration: Some(duration),
            channels: ChannelLayout::Stereo,
            has_video: true,
        }
    }

    /// A still image: no length, no audio.
    pub fn still() -> Self {
        Self {
            duration: None,
            channels: ChannelLayout::None,
            has_video: true,
        }
    }
}

/// Kind-specific payload of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Clip {
        source: SourceRef,
    },
    Composition {
        /// Transition service identifier (e.g. "wipe").
        transition_id: String,
        /// Track composited underneath; `None` means the track directly below.
        a_track: Option<TrackId>,
    },
}

/// Timeline extent plus the source offset it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub position: i64,
    pub duration: i64,
    pub source_in: i64,
}

/// A clip or composition placed (or about to be placed) on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: ItemId,
    /// Owning track, `None` while detached.
    pub track_id: Option<TrackId>,
    /// Start frame on the timeline.
    pub position: i64,
    /// Length in frames, always > 0.
    pub duration: i64,
    /// Offset into the source media.
    pub source_in: i64,
    /// Source length; `None` when the source can be stretched freely.
    pub source_length: Option<i64>,
    pub kind: ItemKind,
}

impl TimelineItem {
    /// Create a clip over `[source_in, source_in + duration)` of `source`.
    pub fn clip(
        id: ItemId,
        source: SourceRef,
        source_in: i64,
        duration: i64,
        source_length: Option<i64>,
    ) -> Self {
        Self {
            id,
            track_id: None,
            position: 0,
            duration,
            source_in,
            source_length,
            kind: ItemKind::Clip { source },
        }
    }

    /// Create a composition of the given length.
    pub fn composition(id: ItemId, transition_id: impl Into<String>, duration: i64) -> Self {
        Self {
            id,
            track_id: None,
            position: 0,
            duration,
            source_in: 0,
            source_length: None,
            kind: ItemKind::Composition {
                transition_id: transition_id.into(),
                a_track: None,
            },
        }
    }

    /// Timeline range `[position, position + duration)`.
    #[inline]
    pub fn range(&self) -> FrameRange {
        FrameRange::new(self.position, self.duration)
    }

    #[inline]
    pub fn end(&self) -> i64 {
        self.range().end()
    }

    /// Get the source out point (exclusive).
    #[inline]
    pub fn source_out(&self) -> i64 {
        self.source_in + self.duration
    }

    pub fn source_range(&self) -> FrameRange {
        FrameRange::new(self.source_in, self.duration)
    }

    pub fn span(&self) -> Span {
        Span {
            position: self.position,
            duration: self.duration,
            source_in: self.source_in,
        }
    }

    pub fn set_span(&mut self, span: Span) {
        self.position = span.position;
        self.duration = span.duration;
        self.source_in = span.source_in;
    }

    pub fn is_clip(&self) -> bool {
        matches!(self.kind, ItemKind::Clip { .. })
    }

    pub fn is_composition(&self) -> bool {
        matches!(self.kind, ItemKind::Composition { .. })
    }

    /// Bin id of a clip's source.
    pub fn bin_id(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Clip { source } => Some(source.as_str()),
            ItemKind::Composition { .. } => None,
        }
    }

    pub fn a_track(&self) -> Option<TrackId> {
        match &self.kind {
            ItemKind::Composition { a_track, .. } => *a_track,
            ItemKind::Clip { .. } => None,
        }
    }

    /// How many frames the start edge may move left before running out of source.
    pub fn head_room(&self) -> Option<i64> {
        match self.kind {
            ItemKind::Clip { .. } if self.source_length.is_some() => Some(self.source_in),
            _ => None,
        }
    }

    /// How many frames the end edge may move right before running out of source.
    pub fn tail_room(&self) -> Option<i64> {
        self.source_length.map(|len| (len - self.source_out()).max(0))
    }

    /// Spans of the two halves of a cut at timeline frame `at`.
    ///
    /// Returns `None` unless `at` lies strictly inside the item.
    pub fn split_spans(&self, at: i64) -> Option<(Span, Span)> {
        if at <= self.position || at >= self.end() {
            return None;
        }
        let offset = at - self.position;
        let left = Span {
            position: self.position,
            duration: offset,
            source_in: self.source_in,
        };
        let right = Span {
            position: at,
            duration: self.duration - offset,
            source_in: self.source_in + offset,
        };
        Some((left, right))
    }
}
