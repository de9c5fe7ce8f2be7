//! Collaborators the controller asks for input.

use framecut_timeline::TrackId;

/// The timeline view as seen from the controller.
pub trait TimelineView {
    /// Track the user is working on, if any.
    fn current_track_id(&self) -> Option<TrackId>;

    /// Frame under the mouse pointer.
    fn mouse_position(&self) -> i64;
}

/// What the user asked for in the spacer dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpacerRequest {
    /// Gap length in frames.
    pub duration: i64,
    pub affect_all_tracks: bool,
}

/// Modal spacer dialog.
pub trait SpacerDialog {
    /// Ask for a gap, proposing `default_duration`. `None` when cancelled.
    fn request_space(&mut self, default_duration: i64) -> Option<SpacerRequest>;
}

impl<F> SpacerDialog for F
where
    F: FnMut(i64) -> Option<SpacerRequest>,
{
    fn request_space(&mut self, default_duration: i64) -> Option<SpacerRequest> {
        self(default_duration)
    }
}
