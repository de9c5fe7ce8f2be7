//! Snap points for timeline interactions.
//!
//! Snap points are item boundaries (starts and ends) on every track, plus any
//! extra cursor positions the caller registers. Granularity is one frame.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::ItemId;
use crate::sequence::Sequence;

/// Kind of snap point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    ItemStart,
    ItemEnd,
    /// Playhead or another caller-supplied cursor.
    Cursor,
}

/// A point on the timeline that can be snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapPoint {
    pub frame: i64,
    pub kind: SnapKind,
}

/// Sorted snap points for one query.
#[derive(Debug, Clone, Default)]
pub struct SnapIndex {
    points: BTreeMap<i64, SnapKind>,
}

impl SnapIndex {
    /// Collect the boundaries of every placed item except `exclude`.
    pub fn from_sequence(seq: &Sequence, exclude: &BTreeSet<ItemId>) -> Self {
        let mut index = Self::default();
        for track in seq.tracks() {
            for (id, range) in track.iter() {
                if exclude.contains(&id) {
                    continue;
                }
                index.add(range.start, SnapKind::ItemStart);
                index.add(range.end(), SnapKind::ItemEnd);
            }
        }
        index
    }

    /// Register a point. The first kind registered at a frame wins.
    pub fn add(&mut self, frame: i64, kind: SnapKind) {
        self.points.entry(frame).or_insert(kind);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = SnapPoint> + '_ {
        self.points
            .iter()
            .map(|(frame, kind)| SnapPoint {
                frame: *frame,
                kind: *kind,
            })
    }

    /// Nearest point strictly after `frame`.
    pub fn next_after(&self, frame: i64) -> Option<i64> {
        let from = frame.checked_add(1)?;
        self.points.range(from..).next().map(|(f, _)| *f)
    }

    /// Nearest point strictly before `frame`.
    pub fn previous_before(&self, frame: i64) -> Option<i64> {
        self.points.range(..frame).next_back().map(|(f, _)| *f)
    }

    /// Find the closest point within `threshold` frames of `frame`.
    /// Ties go to the earlier point.
    pub fn find_snap(&self, frame: i64, threshold: i64) -> Option<i64> {
        if threshold < 0 {
            return None;
        }
        let below = self
            .points
            .range(frame.saturating_sub(threshold)..=frame)
            .next_back()
            .map(|(f, _)| *f);
        let above = self
            .points
            .range(frame..=frame.saturating_add(threshold))
            .next()
            .map(|(f, _)| *f);
        match (below, above) {
            (Some(b), Some(a)) if a.abs_diff(frame) < frame.abs_diff(b) => Some(a),
            (Some(b), _) => Some(b),
            (None, a) => a,
        }
    }

    /// Snap a moved range of `duration` frames starting at `new_start`.
    ///
    /// The start edge is tried first, then the end edge. Returns the
    /// adjusted start, or `new_start` when nothing is within reach.
    pub fn snap_range(&self, new_start: i64, duration: i64, threshold: i64) -> i64 {
        if let Some(snapped) = self.find_snap(new_start, threshold) {
            return snapped;
        }
        if let Some(snapped) = self.find_snap(new_start.saturating_add(duration), threshold) {
            return snapped.saturating_sub(duration);
        }
        new_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_index() -> SnapIndex {
        let mut index = SnapIndex::default();
        index.add(0, SnapKind::ItemStart);
        index.add(100, SnapKind::ItemEnd);
        index.add(150, SnapKind::ItemStart);
        index.add(200, SnapKind::Cursor);
        index
    }

    #[test]
    fn test_find_snap_near_point() {
        let index = make_index();
        assert_eq!(index.find_snap(98, 8), Some(100));
        assert_eq!(index.find_snap(125, 25), Some(100));
    }

    #[test]
    fn test_find_snap_too_far() {
        assert!(make_index().find_snap(50, 8).is_none());
    }

    #[test]
    fn test_next_and_previous_are_strict() {
        let index = make_index();
        assert_eq!(index.next_after(100), Some(150));
        assert_eq!(index.previous_before(100), Some(0));
        assert_eq!(index.next_after(200), None);
        assert_eq!(index.previous_before(0), None);
    }

    #[test]
    fn test_queries_at_frame_extremes() {
        let index = make_index();
        assert_eq!(index.next_after(i64::MAX), None);
        assert_eq!(index.previous_before(i64::MIN), None);
        assert_eq!(index.find_snap(i64::MIN, 8), None);
        assert_eq!(index.find_snap(i64::MAX, 8), None);
        assert_eq!(index.find_snap(i64::MIN + 3, i64::MAX), Some(0));
        assert_eq!(index.snap_range(i64::MAX - 5, 100, 8), i64::MAX - 5);
    }

    #[test]
    fn test_snap_range_uses_end_edge() {
        let index = make_index();
        // Start at 60 is far from everything, end at 145 is near 150.
        assert_eq!(index.snap_range(60, 85, 8), 65);
        assert_eq!(index.snap_range(60, 10, 8), 60);
    }
}
