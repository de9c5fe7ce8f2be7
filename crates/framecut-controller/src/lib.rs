//! Framecut Controller - Front-end facade over the timeline model
//!
//! The [`TimelineController`] turns user gestures into model requests:
//! - Selection tracking with a temporary selection group
//! - Editing gestures (insert, cut, trim to cursor, spacing, grouping)
//! - Playhead and zone navigation
//! - Preview rendering wiring and its document properties
//!
//! It reports back to the front-end through [`ControllerEvent`]s.

pub mod controller;
pub mod events;
pub mod preview;
pub mod selection;
pub mod settings;
pub mod view;

pub use controller::TimelineController;
pub use events::ControllerEvent;
pub use selection::Selection;
pub use settings::ControllerSettings;
pub use view::{SpacerDialog, SpacerRequest, TimelineView};
