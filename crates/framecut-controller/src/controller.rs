//! The timeline controller.
//!
//! Sequences multi-step user gestures on top of [`TimelineItemModel`] and is
//! the only piece that talks to the front-end: it asks the view and dialogs
//! for input, turns refused requests into status messages, forwards
//! invalidated ranges to the preview manager and reports everything that
//! changed as [`ControllerEvent`]s.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use framecut_core::{FrameRange, TimecodeFormat};
use framecut_preview::PreviewManager;
use framecut_timeline::{
    GroupId, ItemId, MediaCatalog, SourceRef, SpacerOperation, SpacerScope, TimelineError,
    TimelineEvent, TimelineItemModel, TimelineResult, TrackId, TrackKind,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{ControllerEvent, Notifier};
use crate::selection::Selection;
use crate::settings::ControllerSettings;
use crate::view::{SpacerDialog, TimelineView};

/// Zoom level a new controller starts with.
pub const DEFAULT_SCALE: f64 = 3.0;

pub struct TimelineController {
    pub(crate) model: TimelineItemModel,
    model_events: Receiver<TimelineEvent>,
    view: Box<dyn TimelineView>,
    pub(crate) settings: ControllerSettings,
    notifier: Notifier,
    selection: Selection,
    position: i64,
    seek_position: Option<i64>,
    scale: f64,
    pub(crate) zone: FrameRange,
    duration: i64,
    pub(crate) document_id: Uuid,
    pub(crate) preview: Option<PreviewManager>,
    /// The preview track is plugged into the output.
    pub(crate) use_preview: bool,
}

impl TimelineController {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        settings: ControllerSettings,
        view: Box<dyn TimelineView>,
    ) -> Self {
        let mut model = TimelineItemModel::new(catalog, settings.timeline.clone());
        let model_events = model.subscribe();
        Self {
            model,
            model_events,
            view,
            settings,
            notifier: Notifier::default(),
            selection: Selection::default(),
            position: 0,
            seek_position: None,
            scale: DEFAULT_SCALE,
            zone: FrameRange::EMPTY,
            duration: 0,
            document_id: Uuid::new_v4(),
            preview: None,
            use_preview: false,
        }
    }

    /// Use a known document id, so the preview cache of an earlier session
    /// is found again.
    pub fn with_document_id(mut self, document_id: Uuid) -> Self {
        self.document_id = document_id;
        self
    }

    pub fn set_view(&mut self, view: Box<dyn TimelineView>) {
        self.view = view;
    }

    /// Open a stream of controller notifications.
    pub fn subscribe(&mut self) -> Receiver<ControllerEvent> {
        self.notifier.subscribe()
    }

    pub fn model(&self) -> &TimelineItemModel {
        &self.model
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    // ── Plumbing ────────────────────────────────────────────────

    pub(crate) fn emit(&mut self, event: ControllerEvent) {
        self.notifier.emit(event);
    }

    pub(crate) fn message(&mut self, text: impl Into<String>) {
        self.emit(ControllerEvent::Message(text.into()));
    }

    fn report(&mut self, err: &TimelineError) {
        debug!(%err, "timeline request refused");
        self.message(err.to_string());
    }

    /// Drain model events: invalidated ranges go to the preview, changes
    /// under the playhead refresh the monitor, deleted items leave the
    /// selection.
    fn sync(&mut self) {
        let events: Vec<TimelineEvent> = self.model_events.try_iter().collect();
        let mut refresh = false;
        for event in events {
            match event {
                TimelineEvent::RangeInvalidated(range) => {
                    if let Some(preview) = self.preview.as_mut() {
                        preview.invalidate_range(range);
                    }
                }
                TimelineEvent::ItemChanged { range, .. } => {
                    refresh |= range.contains(self.position);
                }
                _ => {}
            }
        }

        let before = self.selection.items().len();
        let model = &self.model;
        self.selection.retain(|id| model.item(*id).is_some());
        if self.selection.items().len() != before {
            self.apply_selection();
        }

        self.check_duration();
        if refresh {
            self.emit(ControllerEvent::MonitorRefresh);
        }
    }

    fn finish<T>(&mut self, result: TimelineResult<T>) -> Option<T> {
        self.sync();
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    fn resolve_track(&self, track: Option<TrackId>) -> Option<TrackId> {
        track.or_else(|| self.view.current_track_id())
    }

    // ── Tracks ──────────────────────────────────────────────────

    pub fn add_track(
        &mut self,
        kind: TrackKind,
        name: &str,
        index: Option<usize>,
    ) -> Option<TrackId> {
        let result = self.model.add_track(kind, name, index);
        let track = self.finish(result)?;
        info!(%track, name, "track added");
        Some(track)
    }

    /// Delete a track with everything on it.
    pub fn delete_track(&mut self, track: TrackId) -> bool {
        let result = self.model.delete_track(track);
        let deleted = self.finish(result).is_some();
        if deleted {
            info!(%track, "track deleted");
        }
        deleted
    }

    // ── Selection ───────────────────────────────────────────────

    /// Rebuild the temporary selection group and announce the selection.
    fn apply_selection(&mut self) {
        let ids = self.selection.to_set();
        if ids.len() < 2 {
            self.model.clear_selection();
        } else if let Err(err) = self.model.request_clips_group(&ids, true, true) {
            warn!(%err, "cannot group selection");
        }
        let items = self.selection.items().to_vec();
        self.emit(ControllerEvent::SelectionChanged(items));
    }

    pub fn selection(&self) -> &[ItemId] {
        self.selection.items()
    }

    pub fn selected_track(&self) -> Option<TrackId> {
        self.selection.track()
    }

    pub fn is_multitrack_selected(&self) -> bool {
        self.selection.is_multitrack()
    }

    /// Add one item to the selection.
    pub fn add_selection(&mut self, id: ItemId) {
        if self.model.item(id).is_none() || !self.selection.push(id) {
            return;
        }
        self.apply_selection();
    }

    /// Replace the selection. Nothing happens when it is unchanged.
    pub fn set_selection(&mut self, items: Vec<ItemId>, track: Option<TrackId>, multitrack: bool) {
        let items: Vec<ItemId> = items
            .into_iter()
            .filter(|id| self.model.item(*id).is_some())
            .collect();
        let selection = Selection::new(items, track, multitrack);
        if selection == self.selection {
            return;
        }
        debug!(items = ?selection.items(), ?track, multitrack, "selection changed");
        self.selection = selection;
        self.apply_selection();
    }

    /// Select every item of `tracks` intersecting `[start, end)`.
    pub fn select_items(&mut self, tracks: &[TrackId], start: i64, end: i64) {
        let mut items = Vec::new();
        for track in tracks {
            for id in self.model.items_in_range(*track, start, end) {
                if !items.contains(&id) {
                    items.push(id);
                }
            }
        }
        self.selection = Selection::new(items, None, false);
        self.apply_selection();
    }

    /// Select the whole multitrack instead of items.
    pub fn select_multitrack(&mut self) {
        self.set_selection(Vec::new(), None, true);
    }

    /// The item edit actions apply to.
    pub fn current_item(&self) -> Option<ItemId> {
        self.selection.first()
    }

    // ── Editing ─────────────────────────────────────────────────

    /// Insert a whole source. Track and position default to the view's
    /// current track and the playhead.
    pub fn insert_clip(
        &mut self,
        track: Option<TrackId>,
        position: Option<i64>,
        source: &SourceRef,
        log_undo: bool,
    ) -> Option<ItemId> {
        let Some(track) = self.resolve_track(track) else {
            self.message("No track selected");
            return None;
        };
        let position = position.unwrap_or(self.position);
        let result = self
            .model
            .request_item_insertion(source, track, position, log_undo);
        self.finish(result)
    }

    pub fn insert_composition(
        &mut self,
        track: Option<TrackId>,
        position: Option<i64>,
        transition_id: &str,
        log_undo: bool,
    ) -> Option<ItemId> {
        let Some(track) = self.resolve_track(track) else {
            self.message("No track selected");
            return None;
        };
        let position = position.unwrap_or(self.position);
        let result =
            self.model
                .request_composition_insertion(transition_id, track, position, None, log_undo);
        self.finish(result)
    }

    /// Delete every selected item as one undo step.
    pub fn delete_selected_clips(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let ids = self.selection.to_set();
        let result = self.model.request_items_deletion(&ids);
        if self.finish(result).is_some() {
            info!(count = ids.len(), "selection deleted");
        }
    }

    /// Turn the selection into a persistent group.
    pub fn group_selection(&mut self) -> Option<GroupId> {
        let ids = self.selection.to_set();
        if ids.len() < 2 {
            return None;
        }
        let result = self.model.request_clips_group(&ids, false, true);
        let group = self.finish(result)?;
        // Grouping dropped the temporary group.
        self.apply_selection();
        group
    }

    /// Take `id` (or the first grouped selected item) out of its group and
    /// clear the selection.
    pub fn ungroup_selection(&mut self, id: Option<ItemId>) {
        let target = id.or_else(|| {
            self.selection
                .items()
                .iter()
                .copied()
                .find(|id| self.model.is_in_group(*id))
        });
        let Some(target) = target else {
            return;
        };
        let result = self.model.request_clip_ungroup(target);
        if self.finish(result).is_some() {
            self.selection.clear();
            self.emit(ControllerEvent::SelectionChanged(Vec::new()));
        }
    }

    fn edit_cursor(&self) -> i64 {
        self.seek_position.unwrap_or(self.position)
    }

    fn resize_selection(&mut self, resize_end: bool) {
        let cursor = self.edit_cursor();
        for id in self.selection.items().to_vec() {
            match self.model.request_item_resize_to_pos(id, cursor, resize_end) {
                Ok(outcome) if outcome.is_degraded() => {
                    debug!(%id, ?outcome, "resize stopped early");
                }
                Ok(_) => {}
                Err(err) => self.report(&err),
            }
        }
        self.sync();
    }

    /// Move the start of every selected item to the edit cursor.
    pub fn set_in_point(&mut self) {
        self.resize_selection(false);
    }

    /// Move the end of every selected item to the edit cursor.
    pub fn set_out_point(&mut self) {
        self.resize_selection(true);
    }

    /// Cut the selected items at `position` (default: playhead). Without a
    /// selected item there, cut whatever lies under it on `track`.
    pub fn cut_clip_under_cursor(&mut self, position: Option<i64>, track: Option<TrackId>) -> bool {
        let position = position.unwrap_or(self.position);
        let mut found = false;
        for id in self.selection.items().to_vec() {
            let inside = self
                .model
                .item_range(id)
                .is_some_and(|range| range.start < position && position < range.end());
            if !inside {
                continue;
            }
            match self.model.request_clip_cut(id, position) {
                Ok(_) => found = true,
                Err(err) => self.report(&err),
            }
        }
        if !found {
            let under = self
                .resolve_track(track)
                .and_then(|track| self.model.clip_by_position(track, position));
            if let Some(id) = under {
                match self.model.request_clip_cut(id, position) {
                    Ok(_) => found = true,
                    Err(err) => self.report(&err),
                }
            }
        }
        if found && !self.selection.is_empty() {
            self.apply_selection();
        }
        self.sync();
        if !found {
            self.message("No clip to cut");
        }
        found
    }

    /// Magnetic distance in frames for the current zoom.
    pub fn snap_distance(&self) -> f64 {
        10.0 / self.scale.sqrt()
    }

    /// Move an item (and whatever moves with it), snapping its edges to
    /// nearby boundaries when snapping is on.
    pub fn request_clip_move(
        &mut self,
        id: ItemId,
        track: TrackId,
        position: i64,
        log_undo: bool,
    ) -> bool {
        let mut position = position;
        if self.snap() {
            if let Some(duration) = self.model.item_playtime(id) {
                let threshold = self.snap_distance().round() as i64;
                position = self
                    .model
                    .snap_index_excluding(id)
                    .snap_range(position, duration, threshold);
            }
        }
        let result = self.model.request_item_move(id, track, position, log_undo);
        self.finish(result).is_some()
    }

    /// Anchor a spacer drag; `track = None` spaces every track.
    pub fn request_spacer_start_operation(
        &self,
        track: Option<TrackId>,
        position: i64,
    ) -> Option<SpacerOperation> {
        let scope = track.map_or(SpacerScope::AllTracks, SpacerScope::Track);
        match self.model.request_spacer_start_operation(scope, position) {
            Ok(operation) => Some(operation),
            Err(err) => {
                debug!(%err, position, "no spacer anchor");
                None
            }
        }
    }

    pub fn request_spacer_end_operation(
        &mut self,
        operation: &SpacerOperation,
        new_start: i64,
    ) -> bool {
        let result = self
            .model
            .request_spacer_end_operation(operation, new_start);
        self.finish(result).is_some()
    }

    fn spacer_scope(&mut self, track: Option<TrackId>, all_tracks: bool) -> Option<Option<TrackId>> {
        if all_tracks {
            return Some(None);
        }
        match track {
            Some(track) => Some(Some(track)),
            None => {
                self.message("No track selected");
                None
            }
        }
    }

    /// Open a gap of the length chosen in `dialog` at `frame` (default:
    /// playhead).
    pub fn insert_space(
        &mut self,
        track: Option<TrackId>,
        frame: Option<i64>,
        dialog: &mut dyn SpacerDialog,
    ) -> bool {
        let frame = frame.unwrap_or(self.position);
        let track = self.resolve_track(track);
        let Some(request) = dialog.request_space(self.settings.spacer_default_duration) else {
            return false;
        };
        let Some(scope) = self.spacer_scope(track, request.affect_all_tracks) else {
            return false;
        };
        let Some(operation) = self.request_spacer_start_operation(scope, frame) else {
            self.message("No clips found to insert space");
            return false;
        };
        self.request_spacer_end_operation(&operation, operation.original_start + request.duration)
    }

    /// Close the blank at `frame` (default: playhead) on `track`.
    pub fn remove_space(
        &mut self,
        track: Option<TrackId>,
        frame: Option<i64>,
        affect_all_tracks: bool,
    ) -> bool {
        let frame = frame.unwrap_or(self.position);
        let Some(track_id) = self.resolve_track(track) else {
            self.message("No track selected");
            return false;
        };
        let space = self
            .model
            .track(track_id)
            .and_then(|track| track.blank_range_at(frame))
            .map_or(0, |blank| blank.duration);
        if space == 0 {
            self.message("No space to remove");
            return false;
        }
        let Some(scope) = self.spacer_scope(Some(track_id), affect_all_tracks) else {
            return false;
        };
        let Some(operation) = self.request_spacer_start_operation(scope, frame) else {
            self.message("No clips found to remove space");
            return false;
        };
        self.request_spacer_end_operation(&operation, operation.original_start - space)
    }

    fn after_history(&mut self, result: TimelineResult<()>) -> bool {
        if result.is_ok() && !self.selection.is_empty() {
            self.selection.clear();
            self.emit(ControllerEvent::SelectionChanged(Vec::new()));
        }
        self.finish(result).is_some()
    }

    pub fn undo(&mut self) -> bool {
        let result = self.model.undo();
        self.after_history(result)
    }

    pub fn redo(&mut self) -> bool {
        let result = self.model.redo();
        self.after_history(result)
    }

    // ── Navigation ──────────────────────────────────────────────

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn seek_position(&self) -> Option<i64> {
        self.seek_position
    }

    /// Ask the player to seek to `position`.
    pub fn set_position(&mut self, position: i64) {
        self.set_seek_position(position);
        self.emit(ControllerEvent::Seeked(position));
    }

    pub fn set_seek_position(&mut self, position: i64) {
        self.seek_position = Some(position);
        self.emit(ControllerEvent::SeekPositionChanged(Some(position)));
    }

    /// The player reached `position`.
    pub fn on_seeked(&mut self, position: i64) {
        self.position = position;
        self.emit(ControllerEvent::PositionChanged(position));
        if self.seek_position == Some(position) {
            self.seek_position = None;
            self.emit(ControllerEvent::SeekPositionChanged(None));
        }
    }

    pub fn goto_next_snap(&mut self) {
        let next = self.model.request_next_snap_pos(self.position);
        self.set_position(next);
    }

    pub fn goto_previous_snap(&mut self) {
        let previous = self.model.request_previous_snap_pos(self.position);
        self.set_position(previous);
    }

    /// Seek to the start (or end) of the current item.
    pub fn seek_current_clip(&mut self, seek_to_end: bool) {
        if let Some(id) = self.current_item() {
            self.seek_to_clip(id, seek_to_end);
        }
    }

    pub fn seek_to_clip(&mut self, id: ItemId, seek_to_end: bool) {
        if let Some(range) = self.model.item_range(id) {
            self.set_position(if seek_to_end { range.end() } else { range.start });
        }
    }

    pub fn seek_to_mouse(&mut self) {
        let frame = self.view.mouse_position();
        self.set_position(frame);
    }

    pub fn mouse_position(&self) -> i64 {
        self.view.mouse_position()
    }

    pub fn focus_item(&mut self, id: ItemId) {
        self.seek_to_clip(id, false);
    }

    /// Refresh the monitor if `id` is under the playhead.
    pub fn refresh_item(&mut self, id: ItemId) {
        let Some(range) = self.model.item_range(id) else {
            return;
        };
        if range.start <= self.position && self.position <= range.end() {
            self.emit(ControllerEvent::MonitorRefresh);
        }
    }

    // ── Zone ────────────────────────────────────────────────────

    pub fn zone(&self) -> FrameRange {
        self.zone
    }

    pub fn set_zone(&mut self, zone: FrameRange) {
        self.zone = zone;
        self.emit(ControllerEvent::ZoneChanged(zone));
    }

    pub fn set_zone_in(&mut self, in_point: i64) {
        self.zone = FrameRange::from_start_end(in_point, self.zone.end());
        self.emit(ControllerEvent::ZoneMoved(self.zone));
    }

    pub fn set_zone_out(&mut self, out_point: i64) {
        self.zone = FrameRange::from_start_end(self.zone.start, out_point);
        self.emit(ControllerEvent::ZoneMoved(self.zone));
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Timeline length as last announced.
    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Announce the model's duration if it changed.
    pub fn check_duration(&mut self) {
        let current = self.model.duration();
        if current != self.duration {
            self.duration = current;
            self.emit(ControllerEvent::DurationChanged(current));
        }
    }

    /// Track names keyed by stack position (1 = bottom track).
    pub fn track_names(&self, video_only: bool) -> BTreeMap<usize, String> {
        self.model
            .tracks()
            .iter()
            .enumerate()
            .filter(|(_, track)| !(video_only && track.is_audio()))
            .map(|(index, track)| (index + 1, track.name.clone()))
            .collect()
    }

    /// Name of the track at a stack position; position 0 is the black
    /// background.
    pub fn track_name_from_stack_position(&self, position: Option<usize>) -> String {
        match position {
            None => "unknown".to_owned(),
            Some(0) => "Black".to_owned(),
            Some(pos) => self
                .model
                .tracks()
                .get(pos - 1)
                .map_or_else(|| "unknown".to_owned(), |track| track.name.clone()),
        }
    }

    /// `(audio, video)` track counts.
    pub fn tracks_count(&self) -> (usize, usize) {
        let audio = self.model.tracks().iter().filter(|t| t.is_audio()).count();
        (audio, self.model.tracks_count() - audio)
    }

    pub fn timecode(&self, frames: i64) -> String {
        let format = if self.settings.frame_timecode {
            TimecodeFormat::Frames
        } else {
            TimecodeFormat::SmpteDropFrame
        };
        self.model.frame_rate().timecode(frames, format)
    }

    pub fn composition_a_track(&self, id: ItemId) -> Option<TrackId> {
        self.model.composition_a_track(id)
    }

    pub fn set_composition_a_track(&mut self, id: ItemId, a_track: Option<TrackId>) -> bool {
        let result = self.model.request_composition_a_track(id, a_track);
        let done = self.finish(result).is_some();
        if done {
            self.refresh_item(id);
        }
        done
    }

    pub fn clip_bin_id(&self, id: ItemId) -> Option<String> {
        self.model.clip_bin_id(id).map(str::to_owned)
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    /// Non-positive scales are ignored.
    pub fn set_scale_factor(&mut self, scale: f64) {
        if scale.is_nan() || scale <= 0.0 {
            return;
        }
        self.scale = scale;
        self.emit(ControllerEvent::ScaleFactorChanged(scale));
    }

    pub fn snap(&self) -> bool {
        self.settings.snap_to_points
    }

    pub fn snap_changed(&mut self, snap: bool) {
        self.settings.snap_to_points = snap;
        let distance = snap.then(|| self.snap_distance());
        self.emit(ControllerEvent::SnappingChanged(distance));
    }

    pub fn ripple(&self) -> bool {
        false
    }

    pub fn scrub(&self) -> bool {
        false
    }

    pub fn header_width(&self) -> i32 {
        self.settings.header_width()
    }

    pub fn set_header_width(&mut self, width: i32) {
        self.settings.header_width = width;
    }

    pub fn show_thumbnails(&self) -> bool {
        self.settings.show_thumbnails
    }

    pub fn show_audio_thumbnails(&self) -> bool {
        self.settings.show_audio_thumbnails
    }

    pub fn show_markers(&self) -> bool {
        self.settings.show_markers
    }

    pub fn show_waveforms(&self) -> bool {
        self.settings.show_waveforms
    }
}
