//! Integer identities for timeline entities.
//!
//! Items, tracks and groups draw from one shared counter, so an id is unique
//! across kinds and never handed out twice during a model's lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! timeline_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw integer value.
            #[inline]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

timeline_id!(
    /// Identity of a clip or composition.
    ItemId,
    "item#"
);
timeline_id!(
    /// Identity of a track.
    TrackId,
    "track#"
);
timeline_id!(
    /// Identity of a group node.
    GroupId,
    "group#"
);

/// Monotonic id source. Ids start at 1 and are never recycled.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    fn bump(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn item(&mut self) -> ItemId {
        ItemId(self.bump())
    }

    pub fn track(&mut self) -> TrackId {
        TrackId(self.bump())
    }

    pub fn group(&mut self) -> GroupId {
        GroupId(self.bump())
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
