//! Integration tests for the controller on top of the model and the
//! preview cache.

use framecut_controller::{
    ControllerEvent, ControllerSettings, SpacerRequest, TimelineController, TimelineView,
};
use framecut_core::FrameRange;
use framecut_preview::RenderEvent;
use framecut_timeline::{SourceRef, TrackId, TrackKind};
use tempfile::TempDir;

use crate::support;

struct FixedView(Option<TrackId>);

impl TimelineView for FixedView {
    fn current_track_id(&self) -> Option<TrackId> {
        self.0
    }

    fn mouse_position(&self) -> i64 {
        0
    }
}

struct Session {
    ctl: TimelineController,
    v1: TrackId,
    v2: TrackId,
    _cache: TempDir,
}

fn session() -> Session {
    support::init_tracing();
    let cache = tempfile::tempdir().unwrap();
    let mut settings = ControllerSettings::default();
    settings.preview.cache_root = cache.path().to_path_buf();
    let mut ctl = TimelineController::new(support::catalog(), settings, Box::new(FixedView(None)));
    let v1 = ctl.add_track(TrackKind::Video, "V1", None).unwrap();
    let v2 = ctl.add_track(TrackKind::Video, "V2", None).unwrap();
    ctl.set_view(Box::new(FixedView(Some(v1))));
    Session {
        ctl,
        v1,
        v2,
        _cache: cache,
    }
}

fn av() -> SourceRef {
    SourceRef::new("av")
}

/// Render every dirty chunk successfully.
fn render_all(ctl: &mut TimelineController) {
    let requests = ctl.start_preview_render();
    let tx = ctl.preview_render_sender().unwrap();
    for req in requests {
        std::fs::write(&req.output, b"chunk").unwrap();
        tx.send(RenderEvent::Started {
            chunk: req.chunk,
            ticket: req.ticket,
        })
        .unwrap();
        tx.send(RenderEvent::Completed {
            chunk: req.chunk,
            ticket: req.ticket,
        })
        .unwrap();
    }
    ctl.process_preview_events();
}

#[test]
fn cut_invalidates_preview_and_rerenders() {
    let mut s = session();
    let clip = s.ctl.insert_clip(None, Some(0), &av(), true).unwrap();
    s.ctl.initialize_preview();
    s.ctl.set_zone(FrameRange::new(0, 600));
    s.ctl.add_preview_range(true);
    render_all(&mut s.ctl);
    assert!(s.ctl.dirty_chunks().is_empty());

    // The clip covers [0, 500); cutting it touches every chunk it spans.
    assert!(s.ctl.cut_clip_under_cursor(Some(260), None));
    assert_eq!(s.ctl.model().item_range(clip), Some(FrameRange::new(0, 260)));
    let dirty = s.ctl.dirty_chunks();
    assert_eq!(dirty.first(), Some(&0));
    assert_eq!(dirty.last(), Some(&475));
    assert!(s.ctl.rendered_chunks().contains(&500));

    render_all(&mut s.ctl);
    assert!(s.ctl.dirty_chunks().is_empty());
    assert_eq!(s.ctl.working_preview(), None);
}

#[test]
fn render_report_for_edited_chunk_is_stale() {
    let mut s = session();
    s.ctl.initialize_preview();
    s.ctl.set_zone(FrameRange::new(0, 50));
    s.ctl.add_preview_range(true);
    let requests = s.ctl.start_preview_render();
    assert_eq!(requests.len(), 2);

    // An edit lands while the engine is still working.
    s.ctl.insert_clip(None, Some(10), &av(), true).unwrap();
    let tx = s.ctl.preview_render_sender().unwrap();
    for req in &requests {
        tx.send(RenderEvent::Completed {
            chunk: req.chunk,
            ticket: req.ticket,
        })
        .unwrap();
    }
    assert_eq!(s.ctl.process_preview_events(), 0);
    assert_eq!(s.ctl.dirty_chunks(), vec![0, 25]);
    assert!(s.ctl.rendered_chunks().is_empty());
}

#[test]
fn deleting_a_track_prunes_selection_and_duration() {
    let mut s = session();
    let a = s.ctl.insert_clip(None, Some(0), &av(), true).unwrap();
    let b = s.ctl.insert_clip(Some(s.v2), Some(600), &av(), true).unwrap();
    let events = s.ctl.subscribe();
    s.ctl.set_selection(vec![a, b], None, false);
    assert_eq!(s.ctl.duration(), 1100);

    assert!(s.ctl.delete_track(s.v2));
    assert_eq!(s.ctl.selection(), &[a]);
    assert_eq!(s.ctl.duration(), 500);
    let seen: Vec<_> = events.try_iter().collect();
    assert!(seen.contains(&ControllerEvent::DurationChanged(500)));
    assert!(seen.contains(&ControllerEvent::SelectionChanged(vec![a])));

    assert!(s.ctl.undo());
    assert!(s.ctl.model().item(b).is_some());
    assert_eq!(s.ctl.model().tracks_count(), 2);
}

#[test]
fn spacing_all_tracks_keeps_groups_together() {
    let mut s = session();
    let a = s.ctl.insert_clip(None, Some(0), &av(), true).unwrap();
    let b = s.ctl.insert_clip(Some(s.v1), Some(500), &av(), true).unwrap();
    let c = s.ctl.insert_clip(Some(s.v2), Some(600), &av(), true).unwrap();
    s.ctl.set_selection(vec![b, c], None, false);
    s.ctl.group_selection().unwrap();
    s.ctl.set_selection(Vec::new(), None, false);

    let mut dialog = |_: i64| {
        Some(SpacerRequest {
            duration: 100,
            affect_all_tracks: true,
        })
    };
    assert!(s.ctl.insert_space(None, Some(500), &mut dialog));
    assert_eq!(s.ctl.model().item_position(a), Some(0));
    assert_eq!(s.ctl.model().item_position(b), Some(600));
    assert_eq!(s.ctl.model().item_position(c), Some(700));

    // One undo step for the whole shift.
    assert!(s.ctl.undo());
    assert_eq!(s.ctl.model().item_position(b), Some(500));
    assert_eq!(s.ctl.model().item_position(c), Some(600));
    assert_eq!(s.ctl.model().item_track(c), Some(s.v2));
}
