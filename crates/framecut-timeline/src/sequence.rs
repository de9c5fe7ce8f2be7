//! Raw timeline state that edit commands operate on.
//!
//! `Sequence` owns every track and item. Tracks and groups only refer to items
//! by id. It performs placement checks but no policy (locks, grouping rules);
//! that lives in `TimelineItemModel`.

use std::collections::BTreeMap;

use framecut_core::{FrameRange, FrameRate};

use crate::error::{TimelineError, TimelineResult};
use crate::groups::GroupsModel;
use crate::ids::{ItemId, TrackId};
use crate::item::{Span, TimelineItem};
use crate::track::TrackModel;

/// Tracks (bottom to top), the item arena and the group forest.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    /// Frame rate
    pub frame_rate: FrameRate,
    tracks: Vec<TrackModel>,
    items: BTreeMap<ItemId, TimelineItem>,
    pub(crate) groups: GroupsModel,
}

impl Sequence {
    pub fn new(frame_rate: FrameRate) -> Self {
        Self {
            frame_rate,
            ..Self::default()
        }
    }

    pub fn tracks(&self) -> &[TrackModel] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&TrackModel> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub(crate) fn track_mut(&mut self, id: TrackId) -> TimelineResult<&mut TrackModel> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TimelineError::UnknownTrack(id))
    }

    /// Stacking index of a track (0 = bottom).
    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn groups(&self) -> &GroupsModel {
        &self.groups
    }

    pub fn item(&self, id: ItemId) -> Option<&TimelineItem> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &TimelineItem> {
        self.items.values()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// End of the furthest item over all tracks.
    pub fn duration(&self) -> i64 {
        self.tracks.iter().map(|t| t.duration()).max().unwrap_or(0)
    }

    /// Add an item to the arena and place it on its track.
    pub(crate) fn create_item(&mut self, item: TimelineItem) -> TimelineResult<FrameRange> {
        if self.items.contains_key(&item.id) {
            return Err(TimelineError::Inconsistent(format!("{} exists", item.id)));
        }
        let range = item.range();
        if let Some(track_id) = item.track_id {
            self.track_mut(track_id)?.insert(item.id, range)?;
        }
        self.items.insert(item.id, item);
        Ok(range)
    }

    /// Remove an item from its track and from the arena.
    pub(crate) fn delete_item(&mut self, id: ItemId) -> TimelineResult<TimelineItem> {
        let track_id = self
            .items
            .get(&id)
            .ok_or(TimelineError::UnknownItem(id))?
            .track_id;
        if let Some(track_id) = track_id {
            self.track_mut(track_id)?.remove(id)?;
        }
        self.items
            .remove(&id)
            .ok_or(TimelineError::UnknownItem(id))
    }

    /// Take an item off its track, keeping it in the arena.
    pub(crate) fn detach(&mut self, id: ItemId) -> TimelineResult<FrameRange> {
        let track_id = self
            .items
            .get(&id)
            .and_then(|item| item.track_id)
            .ok_or(TimelineError::UnknownItem(id))?;
        let range = self.track_mut(track_id)?.remove(id)?;
        if let Some(item) = self.items.get_mut(&id) {
            item.track_id = None;
        }
        Ok(range)
    }

    /// Place a detached item on `track_id` at `position`.
    pub(crate) fn attach(
        &mut self,
        id: ItemId,
        track_id: TrackId,
        position: i64,
    ) -> TimelineResult<FrameRange> {
        let item = self.items.get(&id).ok_or(TimelineError::UnknownItem(id))?;
        if item.track_id.is_some() {
            return Err(TimelineError::Inconsistent(format!("{id} is already placed")));
        }
        let range = FrameRange::new(position, item.duration);
        self.track_mut(track_id)?.insert(id, range)?;
        if let Some(item) = self.items.get_mut(&id) {
            item.track_id = Some(track_id);
            item.position = position;
        }
        Ok(range)
    }

    /// Change an item's extent and source offset in place.
    pub(crate) fn reshape(&mut self, id: ItemId, span: Span) -> TimelineResult<()> {
        let track_id = self
            .items
            .get(&id)
            .ok_or(TimelineError::UnknownItem(id))?
            .track_id;
        if let Some(track_id) = track_id {
            self.track_mut(track_id)?
                .reshape(id, FrameRange::new(span.position, span.duration))?;
        }
        if let Some(item) = self.items.get_mut(&id) {
            item.set_span(span);
        }
        Ok(())
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> TimelineResult<&mut TimelineItem> {
        self.items.get_mut(&id).ok_or(TimelineError::UnknownItem(id))
    }

    pub(crate) fn insert_track(&mut self, track: TrackModel, index: usize) -> TimelineResult<()> {
        if self.track(track.id).is_some() {
            return Err(TimelineError::Inconsistent(format!("{} exists", track.id)));
        }
        let index = index.min(self.tracks.len());
        self.tracks.insert(index, track);
        Ok(())
    }

    /// Remove an empty track, returning it with its former stacking index.
    pub(crate) fn remove_track(&mut self, id: TrackId) -> TimelineResult<(TrackModel, usize)> {
        let index = self.track_index(id).ok_or(TimelineError::UnknownTrack(id))?;
        if !self.tracks[index].is_empty() {
            return Err(TimelineError::TrackNotEmpty(id));
        }
        Ok((self.tracks.remove(index), index))
    }

    /// Cross-check arena, tracks and groups; used by tests and debug assertions.
    pub fn validate(&self) -> Result<(), String> {
        for item in self.items.values() {
            if let Some(track_id) = item.track_id {
                let track = self
                    .track(track_id)
                    .ok_or_else(|| format!("{} on missing {track_id}", item.id))?;
                if track.range_of(item.id) != Some(item.range()) {
                    return Err(format!("{} placement out of sync", item.id));
                }
            }
            if item.duration <= 0 {
                return Err(format!("{} has duration {}", item.id, item.duration));
            }
        }
        for track in &self.tracks {
            let mut last_end = i64::MIN;
            for (id, range) in track.iter() {
                if !self.items.contains_key(&id) {
                    return Err(format!("{} references missing {id}", track.id));
                }
                if range.start < last_end {
                    return Err(format!("overlap at {} on {}", range.start, track.id));
                }
                last_end = range.end();
            }
        }
        self.groups.validate()
    }
}
