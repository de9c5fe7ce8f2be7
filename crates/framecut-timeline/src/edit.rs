//! Edit operations with undo/redo support.
//!
//! Uses the Command pattern: every mutation of a [`Sequence`] is an
//! `EditCommand` that knows how to apply itself and produce its inverse.
//! Commands carry complete before/after data, so the inverse of a command is
//! known before it is applied. Requests are composed into a [`Transaction`]
//! which either commits as one undo step or rolls back to the starting state.

use tracing::{debug, error};

use crate::error::{TimelineError, TimelineResult};
use crate::events::{AttributeSet, ChangeKind, ItemAttribute, TimelineEvent};
use crate::groups::GroupsModel;
use crate::ids::{ItemId, TrackId};
use crate::item::{ItemKind, Span, TimelineItem};
use crate::sequence::Sequence;
use crate::track::{TrackModel, TrackProperties};
use framecut_core::FrameRange;

// ── Edit commands ───────────────────────────────────────────────

/// A reversible edit operation on the timeline.
#[derive(Debug, Clone)]
pub enum EditCommand {
    /// Add an item to the arena, placed at its recorded track and position.
    CreateItem { item: TimelineItem },
    /// Remove an item. Holds the full item so the inverse can recreate it.
    DeleteItem { item: TimelineItem },
    /// Take an item off `track_id`, where it started at `position`.
    Detach {
        id: ItemId,
        track_id: TrackId,
        position: i64,
    },
    /// Place a detached item on `track_id` at `position`.
    Attach {
        id: ItemId,
        track_id: TrackId,
        position: i64,
    },
    /// Change an item's position, duration and source offset in place.
    Reshape { id: ItemId, before: Span, after: Span },
    /// Swap the persistent group forest.
    SetGroups {
        before: Box<GroupsModel>,
        after: Box<GroupsModel>,
    },
    /// Insert an empty track at stacking `index`.
    AddTrack { track: Box<TrackModel>, index: usize },
    /// Remove an empty track from stacking `index`.
    RemoveTrack { track: Box<TrackModel>, index: usize },
    UpdateTrack {
        track_id: TrackId,
        before: TrackProperties,
        after: TrackProperties,
    },
    /// Change which track a composition blends onto.
    SetATrack {
        id: ItemId,
        before: Option<TrackId>,
        after: Option<TrackId>,
    },
    /// A batch of commands applied atomically.
    Batch(Vec<EditCommand>),
}

impl EditCommand {
    /// Apply this command to a sequence, appending the resulting change
    /// events to `events`.
    ///
    /// On error the sequence is left as it was before the call.
    pub fn apply(
        &self,
        seq: &mut Sequence,
        events: &mut Vec<TimelineEvent>,
    ) -> TimelineResult<()> {
        match self {
            Self::CreateItem { item } => {
                let range = seq.create_item(item.clone())?;
                events.push(item_event(
                    item.id,
                    ChangeKind::Inserted,
                    &[
                        ItemAttribute::Position,
                        ItemAttribute::Duration,
                        ItemAttribute::Track,
                    ],
                    range,
                ));
                events.push(TimelineEvent::RangeInvalidated(range));
            }
            Self::DeleteItem { item } => {
                let removed = seq.delete_item(item.id)?;
                let range = removed.range();
                events.push(item_event(item.id, ChangeKind::Removed, &[], range));
                events.push(TimelineEvent::RangeInvalidated(range));
            }
            Self::Detach {
                id,
                track_id,
                position,
            } => {
                let placed = seq.item(*id).and_then(|item| item.track_id);
                let current = seq.item(*id).map(|item| item.position);
                if placed != Some(*track_id) || current != Some(*position) {
                    return Err(TimelineError::Inconsistent(format!(
                        "{id} is not at {position} on {track_id}"
                    )));
                }
                let range = seq.detach(*id)?;
                events.push(TimelineEvent::RangeInvalidated(range));
            }
            Self::Attach {
                id,
                track_id,
                position,
            } => {
                let range = seq.attach(*id, *track_id, *position)?;
                events.push(item_event(
                    *id,
                    ChangeKind::Modified,
                    &[ItemAttribute::Position, ItemAttribute::Track],
                    range,
                ));
                events.push(TimelineEvent::RangeInvalidated(range));
            }
            Self::Reshape { id, before, after } => {
                let current = seq.item(*id).ok_or(TimelineError::UnknownItem(*id))?;
                if current.span() != *before {
                    return Err(TimelineError::Inconsistent(format!(
                        "{id} does not have the expected extent"
                    )));
                }
                seq.reshape(*id, *after)?;
                let mut attributes = AttributeSet::new();
                if before.position != after.position {
                    attributes.push(ItemAttribute::Position);
                }
                if before.duration != after.duration {
                    attributes.push(ItemAttribute::Duration);
                }
                if before.source_in != after.source_in {
                    attributes.push(ItemAttribute::SourceIn);
                }
                let old = FrameRange::new(before.position, before.duration);
                let new = FrameRange::new(after.position, after.duration);
                events.push(TimelineEvent::ItemChanged {
                    id: *id,
                    kind: ChangeKind::Modified,
                    attributes,
                    range: new,
                });
                events.push(TimelineEvent::RangeInvalidated(old.union_span(new)));
            }
            Self::SetGroups { after, .. } => {
                seq.groups = (**after).clone();
                events.push(TimelineEvent::GroupsChanged);
            }
            Self::AddTrack { track, index } => {
                seq.insert_track((**track).clone(), *index)?;
                events.push(TimelineEvent::TrackChanged {
                    id: track.id,
                    kind: ChangeKind::Inserted,
                });
            }
            Self::RemoveTrack { track, index } => {
                if seq.track_index(track.id) != Some(*index) {
                    return Err(TimelineError::Inconsistent(format!(
                        "{} is not at index {index}",
                        track.id
                    )));
                }
                seq.remove_track(track.id)?;
                events.push(TimelineEvent::TrackChanged {
                    id: track.id,
                    kind: ChangeKind::Removed,
                });
            }
            Self::UpdateTrack {
                track_id,
                before,
                after,
            } => {
                let track = seq.track_mut(*track_id)?;
                if track.properties() != *before {
                    return Err(TimelineError::Inconsistent(format!(
                        "{track_id} properties changed underneath"
                    )));
                }
                track.set_properties(after.clone());
                let extent = track.duration();
                events.push(TimelineEvent::TrackChanged {
                    id: *track_id,
                    kind: ChangeKind::Modified,
                });
                if before.muted != after.muted && extent > 0 {
                    events.push(TimelineEvent::RangeInvalidated(FrameRange::new(0, extent)));
                }
            }
            Self::SetATrack { id, before, after } => {
                let item = seq.item_mut(*id)?;
                let range = item.range();
                match &mut item.kind {
                    ItemKind::Composition { a_track, .. } if *a_track == *before => {
                        *a_track = *after;
                    }
                    ItemKind::Composition { .. } => {
                        return Err(TimelineError::Inconsistent(format!(
                            "{id} blends onto an unexpected track"
                        )));
                    }
                    ItemKind::Clip { .. } => {
                        return Err(TimelineError::Inconsistent(format!(
                            "{id} is not a composition"
                        )));
                    }
                }
                events.push(item_event(*id, ChangeKind::Modified, &[ItemAttribute::ATrack], range));
                events.push(TimelineEvent::RangeInvalidated(range));
            }
            Self::Batch(commands) => {
                let mut tx = Transaction::new("batch");
                for cmd in commands {
                    if let Err(err) = tx.apply(seq, cmd.clone()) {
                        tx.rollback(seq);
                        return Err(err);
                    }
                }
                events.append(&mut tx.events);
            }
        }
        Ok(())
    }

    /// Produce the inverse command (for undo).
    pub fn inverse(&self) -> Self {
        match self {
            Self::CreateItem { item } => Self::DeleteItem { item: item.clone() },
            Self::DeleteItem { item } => Self::CreateItem { item: item.clone() },
            Self::Detach {
                id,
                track_id,
                position,
            } => Self::Attach {
                id: *id,
                track_id: *track_id,
                position: *position,
            },
            Self::Attach {
                id,
                track_id,
                position,
            } => Self::Detach {
                id: *id,
                track_id: *track_id,
                position: *position,
            },
            Self::Reshape { id, before, after } => Self::Reshape {
                id: *id,
                before: *after,
                after: *before,
            },
            Self::SetGroups { before, after } => Self::SetGroups {
                before: after.clone(),
                after: before.clone(),
            },
            Self::AddTrack { track, index } => Self::RemoveTrack {
                track: track.clone(),
                index: *index,
            },
            Self::RemoveTrack { track, index } => Self::AddTrack {
                track: track.clone(),
                index: *index,
            },
            Self::UpdateTrack {
                track_id,
                before,
                after,
            } => Self::UpdateTrack {
                track_id: *track_id,
                before: after.clone(),
                after: before.clone(),
            },
            Self::SetATrack { id, before, after } => Self::SetATrack {
                id: *id,
                before: *after,
                after: *before,
            },
            Self::Batch(commands) => {
                Self::Batch(commands.iter().rev().map(|c| c.inverse()).collect())
            }
        }
    }

    /// Number of primitive commands in this command.
    pub fn len(&self) -> usize {
        match self {
            Self::Batch(commands) => commands.iter().map(|c| c.len()).sum(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn item_event(
    id: ItemId,
    kind: ChangeKind,
    attributes: &[ItemAttribute],
    range: FrameRange,
) -> TimelineEvent {
    TimelineEvent::ItemChanged {
        id,
        kind,
        attributes: attributes.iter().copied().collect(),
        range,
    }
}

// ── Transactions ────────────────────────────────────────────────

/// Commands applied so far for one user request.
///
/// Dropping a transaction without calling [`Transaction::rollback`] or
/// [`Transaction::finish`] leaves its commands applied and unrecorded, so
/// callers always end it one way or the other.
#[derive(Debug)]
pub struct Transaction {
    label: String,
    applied: Vec<EditCommand>,
    events: Vec<TimelineEvent>,
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            applied: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    /// Apply one command and remember it.
    pub fn apply(&mut self, seq: &mut Sequence, command: EditCommand) -> TimelineResult<()> {
        command.apply(seq, &mut self.events)?;
        self.applied.push(command);
        Ok(())
    }

    /// Revert every applied command, newest first.
    pub fn rollback(self, seq: &mut Sequence) {
        let mut scratch = Vec::new();
        for command in self.applied.iter().rev() {
            if let Err(err) = command.inverse().apply(seq, &mut scratch) {
                error!(label = %self.label, %err, "rollback step failed");
            }
        }
        debug!(label = %self.label, steps = self.applied.len(), "transaction rolled back");
    }

    /// Close the transaction, returning the undo entry and its events.
    ///
    /// Returns `None` for an empty transaction.
    pub fn finish(self) -> Option<(UndoEntry, Vec<TimelineEvent>)> {
        let command = match self.applied.len() {
            0 => return None,
            1 => self.applied.into_iter().next()?,
            _ => EditCommand::Batch(self.applied),
        };
        Some((
            UndoEntry {
                label: self.label,
                command,
            },
            self.events,
        ))
    }
}

// ── Undo stack ──────────────────────────────────────────────────

/// One recorded user action.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// Human readable description, e.g. "Move clip".
    pub label: String,
    pub command: EditCommand,
}

/// Undo/redo history manager.
pub struct UndoStack {
    /// Entries that have been executed (most recent last).
    undo: Vec<UndoEntry>,
    /// Entries that have been undone (most recent last).
    redo: Vec<UndoEntry>,
    /// Maximum history depth.
    max_depth: usize,
}

impl UndoStack {
    /// Create a new undo stack with the given maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            max_depth,
        }
    }

    /// Record an executed entry. Clears the redo history.
    pub fn push(&mut self, entry: UndoEntry) {
        self.redo.clear();
        self.undo.push(entry);
        if self.undo.len() > self.max_depth {
            self.undo.remove(0);
        }
    }

    /// Pop the most recent entry for undo. Returns the inverse command.
    pub fn undo(&mut self) -> Option<EditCommand> {
        let entry = self.undo.pop()?;
        let inverse = entry.command.inverse();
        self.redo.push(entry);
        Some(inverse)
    }

    /// Put back an entry whose inverse could not be applied.
    pub fn cancel_undo(&mut self) {
        if let Some(entry) = self.redo.pop() {
            self.undo.push(entry);
        }
    }

    /// Pop the most recent undone entry for redo. Returns the original command.
    pub fn redo(&mut self) -> Option<EditCommand> {
        let entry = self.redo.pop()?;
        let command = entry.command.clone();
        self.undo.push(entry);
        Some(command)
    }

    /// Put back an entry that could not be replayed.
    pub fn cancel_redo(&mut self) {
        if let Some(entry) = self.undo.pop() {
            self.redo.push(entry);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Label of the entry the next undo would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.last().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(200)
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SourceRef;
    use crate::track::TrackKind;
    use framecut_core::FrameRate;

    fn sequence() -> Sequence {
        let mut seq = Sequence::new(FrameRate::FPS_25);
        seq.insert_track(TrackModel::new(TrackId(1), TrackKind::Video, "V1", 1000), 0)
            .unwrap();
        seq.insert_track(TrackModel::new(TrackId(2), TrackKind::Video, "V2", 1000), 1)
            .unwrap();
        seq
    }

    fn placed(id: i64, track: i64, position: i64, duration: i64) -> TimelineItem {
        let mut item = TimelineItem::clip(ItemId(id), SourceRef::new("s"), 0, duration, None);
        item.track_id = Some(TrackId(track));
        item.position = position;
        item
    }

    fn create(id: i64, position: i64) -> EditCommand {
        EditCommand::CreateItem {
            item: placed(id, 1, position, 10),
        }
    }

    #[test]
    fn test_apply_inverse_restores() {
        let mut seq = sequence();
        let mut events = Vec::new();
        create(10, 0).apply(&mut seq, &mut events).unwrap();

        let mv = EditCommand::Batch(vec![
            EditCommand::Detach {
                id: ItemId(10),
                track_id: TrackId(1),
                position: 0,
            },
            EditCommand::Attach {
                id: ItemId(10),
                track_id: TrackId(2),
                position: 40,
            },
        ]);
        mv.apply(&mut seq, &mut events).unwrap();
        assert_eq!(seq.item(ItemId(10)).unwrap().track_id, Some(TrackId(2)));

        mv.inverse().apply(&mut seq, &mut events).unwrap();
        let item = seq.item(ItemId(10)).unwrap();
        assert_eq!((item.track_id, item.position), (Some(TrackId(1)), 0));
        seq.validate().unwrap();
    }

    #[test]
    fn test_failed_batch_leaves_no_trace() {
        let mut seq = sequence();
        let mut events = Vec::new();
        create(10, 0).apply(&mut seq, &mut events).unwrap();
        events.clear();

        // Second create collides with the first one.
        let batch = EditCommand::Batch(vec![create(11, 100), create(12, 5)]);
        assert!(batch.apply(&mut seq, &mut events).is_err());
        assert!(seq.item(ItemId(11)).is_none());
        assert_eq!(seq.item_count(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn test_transaction_rollback() {
        let mut seq = sequence();
        let mut tx = Transaction::new("insert");
        tx.apply(&mut seq, create(10, 0)).unwrap();
        tx.apply(&mut seq, create(11, 50)).unwrap();
        tx.rollback(&mut seq);
        assert_eq!(seq.item_count(), 0);
    }

    #[test]
    fn test_reshape_rejects_stale_before() {
        let mut seq = sequence();
        let mut events = Vec::new();
        create(10, 0).apply(&mut seq, &mut events).unwrap();
        let stale = EditCommand::Reshape {
            id: ItemId(10),
            before: Span {
                position: 5,
                duration: 10,
                source_in: 0,
            },
            after: Span {
                position: 5,
                duration: 20,
                source_in: 0,
            },
        };
        assert!(matches!(
            stale.apply(&mut seq, &mut events),
            Err(TimelineError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_undo_redo_entries() {
        let mut stack = UndoStack::new(100);
        stack.push(UndoEntry {
            label: "Insert clip".into(),
            command: create(10, 0),
        });
        assert!(stack.can_undo());
        assert!(!stack.can_redo());
        assert_eq!(stack.undo_label(), Some("Insert clip"));

        // Undo should give us a DeleteItem
        let undo_cmd = stack.undo().unwrap();
        assert!(matches!(undo_cmd, EditCommand::DeleteItem { .. }));
        assert!(!stack.can_undo());
        assert!(stack.can_redo());

        stack.cancel_undo();
        assert!(stack.can_undo());
        assert!(!stack.can_redo());

        stack.undo();
        let redo_cmd = stack.redo().unwrap();
        assert!(matches!(redo_cmd, EditCommand::CreateItem { .. }));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_new_action_clears_redo() {
        let mut stack = UndoStack::new(100);
        stack.push(UndoEntry {
            label: "a".into(),
            command: create(10, 0),
        });
        stack.undo();
        assert!(stack.can_redo());

        stack.push(UndoEntry {
            label: "b".into(),
            command: create(11, 0),
        });
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_max_depth() {
        let mut stack = UndoStack::new(3);
        for i in 0..5 {
            stack.push(UndoEntry {
                label: format!("step {i}"),
                command: create(i, i * 10),
            });
        }
        assert_eq!(stack.undo_count(), 3);
        assert_eq!(stack.undo_label(), Some("step 4"));
    }
}
