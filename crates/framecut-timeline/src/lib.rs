//! Framecut Timeline - Timeline data model
//!
//! Implements the editing model of the timeline:
//! - Tracks holding non-overlapping clips and compositions
//! - A group forest for items that move together
//! - Invertible edit commands with undo/redo
//! - The `TimelineItemModel` request API, spacer, cut and snapping
//! - Change events published over channels

pub mod catalog;
pub mod config;
pub mod edit;
pub mod error;
pub mod events;
pub mod groups;
pub mod ids;
pub mod item;
pub mod model;
pub mod sequence;
pub mod snapping;
pub mod spacer;
pub mod track;

pub use catalog::{InMemoryCatalog, MediaCatalog};
pub use config::TimelineConfig;
pub use edit::{EditCommand, Transaction, UndoEntry, UndoStack};
pub use error::{TimelineError, TimelineResult};
pub use events::{AttributeSet, ChangeKind, EventBus, ItemAttribute, TimelineEvent};
pub use groups::{GroupMember, GroupType, GroupsModel};
pub use ids::{GroupId, IdAllocator, ItemId, TrackId};
pub use item::{ChannelLayout, ItemKind, MediaHandle, SourceRef, Span, TimelineItem};
pub use model::{ClipSpec, ResizeOutcome, TimelineItemModel};
pub use sequence::Sequence;
pub use snapping::{SnapIndex, SnapKind, SnapPoint};
pub use spacer::{SpacerOperation, SpacerScope};
pub use track::{TrackKind, TrackModel, TrackProperties};
