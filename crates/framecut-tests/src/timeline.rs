//! Integration tests for the timeline model.
//!
//! Drives framecut-timeline through long random edit sessions and checks
//! the structural invariants after every step, then replays the whole
//! history backwards and forwards.

use std::collections::BTreeSet;

use framecut_core::FrameRange;
use framecut_timeline::{
    ClipSpec, ItemId, SourceRef, SpacerScope, TimelineError, TimelineEvent, TimelineItemModel,
    TrackId, TrackKind,
};
use proptest::prelude::*;

use crate::support;

// ── Helpers ────────────────────────────────────────────────────

fn build() -> (TimelineItemModel, Vec<TrackId>) {
    let mut model = support::model();
    let tracks = vec![
        model.add_track(TrackKind::Video, "V1", None).unwrap(),
        model.add_track(TrackKind::Video, "V2", None).unwrap(),
        model.add_track(TrackKind::Video, "V3", None).unwrap(),
    ];
    (model, tracks)
}

fn clip(model: &mut TimelineItemModel, track: TrackId, position: i64, duration: i64) -> ItemId {
    let spec = ClipSpec {
        source: SourceRef::new("av"),
        source_in: 0,
        duration: Some(duration),
    };
    model
        .request_clip_insertion(spec, track, position, true)
        .unwrap()
}

fn item_ids(model: &TimelineItemModel) -> Vec<ItemId> {
    model.sequence().items().map(|item| item.id).collect()
}

fn assert_consistent(model: &TimelineItemModel) {
    model.sequence().validate().unwrap();
    let max_end = model
        .sequence()
        .items()
        .map(|item| item.end())
        .max()
        .unwrap_or(0);
    assert_eq!(model.duration(), max_end);
}

// ── Random sessions ────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Insert { track: usize, position: i64, duration: i64 },
    Move { pick: usize, track: usize, position: i64 },
    Resize { pick: usize, target: i64, end: bool },
    Cut { pick: usize, offset: i64 },
    Group { picks: Vec<usize>, temporary: bool },
    Ungroup { pick: usize },
    Delete { pick: usize },
    Spacer { track: Option<usize>, position: i64, delta: i64 },
    Undo,
    Redo,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, 0..600i64, 1..120i64)
            .prop_map(|(track, position, duration)| Op::Insert { track, position, duration }),
        2 => (any::<usize>(), 0..3usize, 0..600i64)
            .prop_map(|(pick, track, position)| Op::Move { pick, track, position }),
        2 => (any::<usize>(), -50..700i64, any::<bool>())
            .prop_map(|(pick, target, end)| Op::Resize { pick, target, end }),
        1 => (any::<usize>(), 0..120i64).prop_map(|(pick, offset)| Op::Cut { pick, offset }),
        1 => (proptest::collection::vec(any::<usize>(), 2..4), any::<bool>())
            .prop_map(|(picks, temporary)| Op::Group { picks, temporary }),
        1 => any::<usize>().prop_map(|pick| Op::Ungroup { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
        1 => (proptest::option::of(0..3usize), 0..600i64, -80..80i64)
            .prop_map(|(track, position, delta)| Op::Spacer { track, position, delta }),
        1 => Just(Op::Undo),
        1 => Just(Op::Redo),
    ]
}

fn pick(model: &TimelineItemModel, index: usize) -> Option<ItemId> {
    let ids = item_ids(model);
    (!ids.is_empty()).then(|| ids[index % ids.len()])
}

/// Run one operation; refusals are fine, inconsistency is not.
fn run(model: &mut TimelineItemModel, tracks: &[TrackId], op: &Op) {
    let result: Result<(), TimelineError> = match op {
        Op::Insert { track, position, duration } => {
            let spec = ClipSpec {
                source: SourceRef::new("av"),
                source_in: 0,
                duration: Some(*duration),
            };
            model
                .request_clip_insertion(spec, tracks[*track], *position, true)
                .map(drop)
        }
        Op::Move { pick: p, track, position } => match pick(model, *p) {
            Some(id) => model.request_item_move(id, tracks[*track], *position, true),
            None => Ok(()),
        },
        Op::Resize { pick: p, target, end } => match pick(model, *p) {
            Some(id) => model.request_item_resize_to_pos(id, *target, *end).map(drop),
            None => Ok(()),
        },
        Op::Cut { pick: p, offset } => match pick(model, *p) {
            Some(id) => {
                let position = model.item_position(id).unwrap_or(0) + offset;
                model.request_clip_cut(id, position).map(drop)
            }
            None => Ok(()),
        },
        Op::Group { picks, temporary } => {
            let ids: BTreeSet<ItemId> = picks.iter().filter_map(|p| pick(model, *p)).collect();
            model.request_clips_group(&ids, *temporary, true).map(drop)
        }
        Op::Ungroup { pick: p } => match pick(model, *p) {
            Some(id) => model.request_clip_ungroup(id).map(drop),
            None => Ok(()),
        },
        Op::Delete { pick: p } => match pick(model, *p) {
            Some(id) => model.request_item_deletion(id, true),
            None => Ok(()),
        },
        Op::Spacer { track, position, delta } => {
            let scope = track.map_or(SpacerScope::AllTracks, |t| SpacerScope::Track(tracks[t]));
            match model.request_spacer_start_operation(scope, *position) {
                Ok(operation) => model
                    .request_spacer_end_operation(&operation, operation.original_start + delta),
                Err(_) => Ok(()),
            }
        }
        Op::Undo => model.undo(),
        Op::Redo => model.redo(),
    };
    if let Err(TimelineError::Inconsistent(reason)) = result {
        panic!("{op:?} broke the timeline: {reason}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_sessions_keep_invariants(ops in proptest::collection::vec(op(), 1..40)) {
        let (mut model, tracks) = build();
        for op in &ops {
            run(&mut model, &tracks, op);
            assert_consistent(&model);
        }

        // Unwinding the whole history leaves an empty timeline.
        let final_ids: BTreeSet<ItemId> = item_ids(&model).into_iter().collect();
        while model.can_undo() {
            model.undo().unwrap();
            assert_consistent(&model);
        }
        prop_assert_eq!(model.sequence().item_count(), 0);
        prop_assert_eq!(model.tracks_count(), 0);

        // Replaying it restores the same items.
        while model.can_redo() {
            model.redo().unwrap();
            assert_consistent(&model);
        }
        let replayed: BTreeSet<ItemId> = item_ids(&model).into_iter().collect();
        prop_assert_eq!(replayed, final_ids);
    }
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn gap_insertion_scenario() {
    let (mut model, tracks) = build();
    let v1 = tracks[0];
    clip(&mut model, v1, 0, 100);
    clip(&mut model, v1, 150, 50);
    assert_eq!(model.blank_size_at(v1, 100), 50);

    let spec = |duration| ClipSpec {
        source: SourceRef::new("av"),
        source_in: 0,
        duration: Some(duration),
    };
    assert!(matches!(
        model.request_clip_insertion(spec(60), v1, 100, true),
        Err(TimelineError::PlacementConflict { .. })
    ));
    model.request_clip_insertion(spec(40), v1, 100, true).unwrap();
    assert_consistent(&model);
}

#[test]
fn grouped_items_follow_across_tracks() {
    let (mut model, tracks) = build();
    let a = clip(&mut model, tracks[0], 0, 50);
    let b = clip(&mut model, tracks[1], 100, 50);
    let c = clip(&mut model, tracks[1], 200, 50);
    model
        .request_clips_group(&BTreeSet::from([a, b, c]), false, true)
        .unwrap();

    model.request_item_move(a, tracks[1], 30, true).unwrap();
    assert_eq!(model.item_track(a), Some(tracks[1]));
    assert_eq!(model.item_track(b), Some(tracks[2]));
    assert_eq!(model.item_position(b), Some(130));
    assert_eq!(model.item_position(c), Some(230));

    // Ungrouping `a` leaves b and c grouped.
    model.request_clip_ungroup(a).unwrap();
    assert!(!model.is_in_group(a));
    assert_eq!(model.move_set(b), BTreeSet::from([b, c]));
}

#[test]
fn spacer_closing_gap_is_all_or_nothing() {
    let (mut model, tracks) = build();
    clip(&mut model, tracks[0], 0, 100);
    let b = clip(&mut model, tracks[0], 150, 50);
    // A stationary item on V2 sits where `c` would land.
    clip(&mut model, tracks[1], 120, 50);
    let c = clip(&mut model, tracks[1], 200, 50);

    let op = model
        .request_spacer_start_operation(SpacerScope::AllTracks, 140)
        .unwrap();
    assert_eq!(op.anchor, b);
    assert!(model.request_spacer_end_operation(&op, 100).is_err());
    assert_eq!(model.item_position(b), Some(150));
    assert_eq!(model.item_position(c), Some(200));

    model.request_spacer_end_operation(&op, 145).unwrap();
    assert_eq!(model.item_position(b), Some(145));
    assert_eq!(model.item_position(c), Some(195));
    assert_consistent(&model);
}

#[test]
fn structural_changes_invalidate_their_ranges() {
    let (mut model, tracks) = build();
    let events = model.subscribe();
    let a = clip(&mut model, tracks[0], 10, 40);
    model.request_item_move(a, tracks[0], 100, true).unwrap();

    let ranges: Vec<FrameRange> = events
        .try_iter()
        .filter_map(|event| match event {
            TimelineEvent::RangeInvalidated(range) => Some(range),
            _ => None,
        })
        .collect();
    assert!(ranges.contains(&FrameRange::new(10, 40)));
    assert!(ranges.contains(&FrameRange::new(100, 40)));
}
