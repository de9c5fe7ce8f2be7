//! Change records published by the model.
//!
//! The model never calls back into its observers. Each committed request
//! produces a batch of `TimelineEvent`s that is fanned out to every
//! subscriber's channel.

use crossbeam_channel::{unbounded, Receiver, Sender};
use framecut_core::FrameRange;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ids::{ItemId, TrackId};

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Inserted,
    Modified,
    Removed,
}

/// Item attribute touched by a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemAttribute {
    Position,
    Duration,
    SourceIn,
    Track,
    ATrack,
}

/// Changed-attribute set carried by item events.
pub type AttributeSet = SmallVec<[ItemAttribute; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEvent {
    ItemChanged {
        id: ItemId,
        kind: ChangeKind,
        attributes: AttributeSet,
        /// Range of the item after the change (before it, for removals).
        range: FrameRange,
    },
    TrackChanged {
        id: TrackId,
        kind: ChangeKind,
    },
    GroupsChanged,
    /// Rendered output over this range is stale.
    RangeInvalidated(FrameRange),
    DurationChanged {
        duration: i64,
    },
}

/// Fan-out of event batches to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<TimelineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new event stream. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&mut self, events: &[TimelineEvent]) {
        if events.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| {
            events
                .iter()
                .all(|event| tx.send(event.clone()).is_ok())
        });
    }
}
