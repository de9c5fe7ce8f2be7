//! Two-phase spacer: open or close a gap by shifting everything after a point.
//!
//! `request_spacer_start_operation` only reads the model and returns a
//! [`SpacerOperation`] naming the anchor item. The caller drags, then hands the
//! operation back to `request_spacer_end_operation`, which checks the whole
//! shift for feasibility before moving a single item.

use std::collections::BTreeSet;

use framecut_core::FrameRange;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TimelineError, TimelineResult};
use crate::ids::{ItemId, TrackId};
use crate::model::TimelineItemModel;
use crate::track::TrackModel;

/// Tracks a spacer operation affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpacerScope {
    Track(TrackId),
    /// Every unlocked track.
    AllTracks,
}

/// An anchored spacer drag in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacerOperation {
    /// First item at or after the requested position.
    pub anchor: ItemId,
    pub scope: SpacerScope,
    /// Start of the anchor when the drag began.
    pub original_start: i64,
}

impl TimelineItemModel {
    /// Find the first item starting at or after `position` within `scope`.
    ///
    /// Nothing is mutated.
    pub fn request_spacer_start_operation(
        &self,
        scope: SpacerScope,
        position: i64,
    ) -> TimelineResult<SpacerOperation> {
        let mut best: Option<(ItemId, i64)> = None;
        for track in self.spacer_tracks(scope)? {
            if let Some((id, start)) = track.first_at_or_after(position) {
                if best.map_or(true, |(_, s)| start < s) {
                    best = Some((id, start));
                }
            }
        }
        let (anchor, original_start) = best.ok_or(TimelineError::NoAnchor { position })?;
        debug!(%anchor, original_start, ?scope, "spacer anchored");
        Ok(SpacerOperation {
            anchor,
            scope,
            original_start,
        })
    }

    /// Shift every item at or after the anchor's original start by
    /// `new_start - original_start`, dragging whole groups along.
    ///
    /// Fails without moving anything if a shifted item would leave the track
    /// or land on an item that is not shifted.
    pub fn request_spacer_end_operation(
        &mut self,
        operation: &SpacerOperation,
        new_start: i64,
    ) -> TimelineResult<()> {
        if self.item(operation.anchor).is_none() {
            return Err(TimelineError::UnknownItem(operation.anchor));
        }
        let delta = new_start
            .checked_sub(operation.original_start)
            .ok_or_else(|| self.out_of_range(FrameRange::new(new_start, 0)))?;
        let moving = self.spacer_items(operation)?;
        if moving.is_empty() {
            return Err(TimelineError::NoAnchor {
                position: operation.original_start,
            });
        }
        if delta == 0 {
            return Ok(());
        }
        self.check_spacer_feasible(&moving, delta)?;
        let plan = self.plan_shift(&moving, delta, 0)?;
        let label = if delta > 0 { "Insert space" } else { "Remove space" };
        self.run(label, true, |model, tx| model.apply_shift(tx, &plan))?;
        debug!(items = moving.len(), delta, "spacer applied");
        Ok(())
    }

    fn spacer_tracks(&self, scope: SpacerScope) -> TimelineResult<Vec<&TrackModel>> {
        match scope {
            SpacerScope::Track(id) => {
                let track = self.track(id).ok_or(TimelineError::UnknownTrack(id))?;
                if track.locked {
                    return Err(TimelineError::TrackLocked(id));
                }
                Ok(vec![track])
            }
            SpacerScope::AllTracks => Ok(self.tracks().iter().filter(|t| !t.locked).collect()),
        }
    }

    /// Items in scope starting at or after the original start, expanded to
    /// their persistent groups.
    fn spacer_items(&self, operation: &SpacerOperation) -> TimelineResult<BTreeSet<ItemId>> {
        let mut moving = BTreeSet::new();
        for track in self.spacer_tracks(operation.scope)? {
            for id in track.clips_after(operation.original_start) {
                if !moving.contains(&id) {
                    moving.extend(self.groups().persistent_move_set(id));
                }
            }
        }
        Ok(moving)
    }

    fn check_spacer_feasible(&self, moving: &BTreeSet<ItemId>, delta: i64) -> TimelineResult<()> {
        for id in moving {
            let (Some(track_id), Some(range)) = (self.item_track(*id), self.item_range(*id)) else {
                return Err(TimelineError::UnknownItem(*id));
            };
            let track = self
                .track(track_id)
                .ok_or(TimelineError::UnknownTrack(track_id))?;
            let target: FrameRange = range.shifted(delta);
            if target.start < 0 || target.end() > track.max_frame() {
                return Err(TimelineError::OutOfRange {
                    range: target,
                    max_frame: track.max_frame(),
                });
            }
            let blocker = track
                .clips_in_range(target.start, target.end())
                .into_iter()
                .find(|other| !moving.contains(other));
            if let Some(occupant) = blocker {
                return Err(TimelineError::PlacementConflict {
                    track: track_id,
                    range: target,
                    occupant,
                });
            }
        }
        Ok(())
    }
}
