//! Notifications the controller sends to the front-end.

use crossbeam_channel::{unbounded, Receiver, Sender};
use framecut_core::FrameRange;
use framecut_timeline::ItemId;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    PositionChanged(i64),
    /// `None` once the player has reached the requested seek.
    SeekPositionChanged(Option<i64>),
    /// The player should seek to this frame.
    Seeked(i64),
    SelectionChanged(Vec<ItemId>),
    DurationChanged(i64),
    /// The whole zone was replaced.
    ZoneChanged(FrameRange),
    /// One zone edge moved.
    ZoneMoved(FrameRange),
    ScaleFactorChanged(f64),
    /// Magnetic distance in frames, `None` when snapping is off.
    SnappingChanged(Option<f64>),
    /// The monitor shows stale content.
    MonitorRefresh,
    /// Transient message for the status bar.
    Message(String),
}

/// Fan-out of controller events to every listener.
#[derive(Debug, Default)]
pub(crate) struct Notifier {
    listeners: Vec<Sender<ControllerEvent>>,
}

impl Notifier {
    pub fn subscribe(&mut self) -> Receiver<ControllerEvent> {
        let (tx, rx) = unbounded();
        self.listeners.push(tx);
        rx
    }

    /// Send to every live listener, forgetting disconnected ones.
    pub fn emit(&mut self, event: ControllerEvent) {
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }
}
