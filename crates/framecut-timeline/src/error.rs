//! Error types for timeline mutations.

use framecut_core::FrameRange;
use thiserror::Error;

use crate::ids::{ItemId, TrackId};

/// Reasons a timeline request is refused.
///
/// A refused request never leaves partial state behind and never records an
/// undo step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// The target range intersects an existing placement.
    #[error("{range} on {track} is occupied by {occupant}")]
    PlacementConflict {
        track: TrackId,
        range: FrameRange,
        occupant: ItemId,
    },

    /// Negative position or past the track's addressable range.
    #[error("frame range {range} is outside the track (max frame {max_frame})")]
    OutOfRange { range: FrameRange, max_frame: i64 },

    /// The media catalog could not resolve the source reference.
    #[error("cannot resolve source '{0}'")]
    InvalidSource(String),

    /// A neighbor or the source length prevents the edge from moving at all.
    #[error("resize of {item} blocked at frame {edge}")]
    ResizeBlocked { item: ItemId, edge: i64 },

    /// Cut position not strictly inside the item.
    #[error("cannot cut {item} at frame {position}")]
    InvalidCutPoint { item: ItemId, position: i64 },

    /// The spacer found nothing at or after the position.
    #[error("no item at or after frame {position}")]
    NoAnchor { position: i64 },

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("unknown track {0}")]
    UnknownTrack(TrackId),

    #[error("{0} is locked")]
    TrackLocked(TrackId),

    #[error("{0} still holds items")]
    TrackNotEmpty(TrackId),

    /// The item cannot live on (or blend onto) that track.
    #[error("{track} cannot take this item: {reason}")]
    IncompatibleTrack { track: TrackId, reason: &'static str },

    #[error("invalid duration {0}")]
    InvalidDuration(i64),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    /// Replaying history hit a state it did not expect.
    #[error("timeline state inconsistent: {0}")]
    Inconsistent(String),
}

/// Result type alias for timeline operations.
pub type TimelineResult<T> = std::result::Result<T, TimelineError>;
