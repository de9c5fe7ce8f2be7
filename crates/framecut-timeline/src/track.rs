//! Track model: one lane of non-overlapping item placements.
//!
//! Placements are keyed by start frame in a `BTreeMap`, so spatial queries are
//! `O(log n)`. Blank space is the complement of the placements and is never
//! stored.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use framecut_core::FrameRange;
use serde::{Deserialize, Serialize};

use crate::error::{TimelineError, TimelineResult};
use crate::ids::{ItemId, TrackId};

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// User-editable track attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackProperties {
    pub name: String,
    pub muted: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    item: ItemId,
    end: i64,
}

/// A track holding item placements by id.
#[derive(Debug, Clone)]
pub struct TrackModel {
    /// Unique track ID
    pub id: TrackId,
    /// Track kind
    pub kind: TrackKind,
    /// Track name
    pub name: String,
    /// Is track muted
    pub muted: bool,
    /// Is track locked (prevent edits)
    pub locked: bool,
    max_frame: i64,
    slots: BTreeMap<i64, Slot>,
    starts: HashMap<ItemId, i64>,
}

impl TrackModel {
    /// Create an empty track whose placements must end at or before `max_frame`.
    pub fn new(id: TrackId, kind: TrackKind, name: impl Into<String>, max_frame: i64) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            muted: false,
            locked: false,
            max_frame,
            slots: BTreeMap::new(),
            starts: HashMap::new(),
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == TrackKind::Audio
    }

    pub fn max_frame(&self) -> i64 {
        self.max_frame
    }

    pub fn properties(&self) -> TrackProperties {
        TrackProperties {
            name: self.name.clone(),
            muted: self.muted,
            locked: self.locked,
        }
    }

    pub fn set_properties(&mut self, props: TrackProperties) {
        self.name = props.name;
        self.muted = props.muted;
        self.locked = props.locked;
    }

    /// Number of placed items.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.starts.contains_key(&item)
    }

    /// Range occupied by `item`, if placed here.
    pub fn range_of(&self, item: ItemId) -> Option<FrameRange> {
        let start = *self.starts.get(&item)?;
        self.slots
            .get(&start)
            .map(|slot| FrameRange::from_start_end(start, slot.end))
    }

    /// End of the last placement, 0 for an empty track.
    pub fn duration(&self) -> i64 {
        self.slots.values().next_back().map_or(0, |slot| slot.end)
    }

    /// Item covering `frame`, if any.
    pub fn clip_at_position(&self, frame: i64) -> Option<ItemId> {
        self.slots
            .range(..=frame)
            .next_back()
            .filter(|(_, slot)| slot.end > frame)
            .map(|(_, slot)| slot.item)
    }

    /// Items intersecting `[start, end)`.
    pub fn clips_in_range(&self, start: i64, end: i64) -> BTreeSet<ItemId> {
        if end <= start {
            return BTreeSet::new();
        }
        let mut found: BTreeSet<ItemId> = self
            .slots
            .range(start..end)
            .map(|(_, slot)| slot.item)
            .collect();
        // A placement starting before `start` may still reach into the range.
        if let Some((_, slot)) = self.slots.range(..start).next_back() {
            if slot.end > start {
                found.insert(slot.item);
            }
        }
        found
    }

    /// Items whose start is at or after `position`, in position order.
    pub fn clips_after(&self, position: i64) -> impl Iterator<Item = ItemId> + '_ {
        self.slots.range(position..).map(|(_, slot)| slot.item)
    }

    /// First item starting at or after `position`.
    pub fn first_at_or_after(&self, position: i64) -> Option<(ItemId, i64)> {
        self.slots
            .range(position..)
            .next()
            .map(|(start, slot)| (slot.item, *start))
    }

    /// Blank frames from `frame` up to the next placement, 0 if occupied.
    ///
    /// After the last placement the blank extends to the end of the track.
    pub fn blank_size_at(&self, frame: i64) -> i64 {
        self.blank_range_at(frame)
            .map_or(0, |blank| blank.end() - frame)
    }

    /// The whole blank region containing `frame`.
    pub fn blank_range_at(&self, frame: i64) -> Option<FrameRange> {
        if frame < 0 || frame >= self.max_frame || self.clip_at_position(frame).is_some() {
            return None;
        }
        let start = self
            .slots
            .range(..=frame)
            .next_back()
            .map_or(0, |(_, slot)| slot.end);
        let end = self
            .slots
            .range(frame..)
            .next()
            .map_or(self.max_frame, |(start, _)| *start);
        Some(FrameRange::from_start_end(start, end))
    }

    /// Placement ending nearest before `item`'s start.
    pub fn neighbor_before(&self, item: ItemId) -> Option<(ItemId, FrameRange)> {
        let start = *self.starts.get(&item)?;
        self.slots
            .range(..start)
            .next_back()
            .map(|(s, slot)| (slot.item, FrameRange::from_start_end(*s, slot.end)))
    }

    /// Placement starting nearest after `item`'s start.
    pub fn neighbor_after(&self, item: ItemId) -> Option<(ItemId, FrameRange)> {
        let start = *self.starts.get(&item)?;
        self.slots
            .range(start + 1..)
            .next()
            .map(|(s, slot)| (slot.item, FrameRange::from_start_end(*s, slot.end)))
    }

    /// Placements in position order. Call again to restart.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, FrameRange)> + '_ {
        self.slots
            .iter()
            .map(|(start, slot)| (slot.item, FrameRange::from_start_end(*start, slot.end)))
    }

    /// Verify `range` could be occupied, ignoring `ignore`'s own placement.
    pub fn check_free(&self, range: FrameRange, ignore: Option<ItemId>) -> TimelineResult<()> {
        if range.duration <= 0 {
            return Err(TimelineError::InvalidDuration(range.duration));
        }
        if range.start < 0 || range.end() > self.max_frame {
            return Err(TimelineError::OutOfRange {
                range,
                max_frame: self.max_frame,
            });
        }
        // Placements are disjoint and sorted, so the closest one starting
        // before our end is the only candidate for overlap.
        let candidate = self
            .slots
            .range(..range.end())
            .rev()
            .find(|(_, slot)| Some(slot.item) != ignore);
        match candidate {
            Some((_, slot)) if slot.end > range.start => Err(TimelineError::PlacementConflict {
                track: self.id,
                range,
                occupant: slot.item,
            }),
            _ => Ok(()),
        }
    }

    /// Place `item` over `range`.
    pub fn insert(&mut self, item: ItemId, range: FrameRange) -> TimelineResult<()> {
        if self.contains(item) {
            return Err(TimelineError::Inconsistent(format!(
                "{item} already placed on {}",
                self.id
            )));
        }
        self.check_free(range, None)?;
        self.slots.insert(
            range.start,
            Slot {
                item,
                end: range.end(),
            },
        );
        self.starts.insert(item, range.start);
        Ok(())
    }

    /// Remove `item`, returning the range it occupied.
    pub fn remove(&mut self, item: ItemId) -> TimelineResult<FrameRange> {
        let start = self
            .starts
            .remove(&item)
            .ok_or(TimelineError::UnknownItem(item))?;
        let slot = self
            .slots
            .remove(&start)
            .ok_or_else(|| TimelineError::Inconsistent(format!("{item} has no slot")))?;
        Ok(FrameRange::from_start_end(start, slot.end))
    }

    /// Move `item` to start at `new_position`, keeping its length.
    pub fn move_item(&mut self, item: ItemId, new_position: i64) -> TimelineResult<()> {
        let current = self.range_of(item).ok_or(TimelineError::UnknownItem(item))?;
        self.reshape(item, FrameRange::new(new_position, current.duration))
    }

    /// Replace `item`'s placement with `range`.
    pub fn reshape(&mut self, item: ItemId, range: FrameRange) -> TimelineResult<()> {
        if !self.contains(item) {
            return Err(TimelineError::UnknownItem(item));
        }
        self.check_free(range, Some(item))?;
        self.remove(item)?;
        self.insert(item, range)
    }

    /// Every placement start and end, unsorted and possibly repeated.
    pub fn boundaries(&self) -> impl Iterator<Item = i64> + '_ {
        self.slots
            .iter()
            .flat_map(|(start, slot)| [*start, slot.end])
    }
}
