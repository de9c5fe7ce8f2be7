//! Benchmarks for framecut-timeline spatial queries.
//!
//! Run with: cargo bench -p framecut-timeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use framecut_core::FrameRange;
use framecut_timeline::{ItemId, TrackId, TrackKind, TrackModel};

/// 10k clips of 40 frames separated by 10-frame gaps.
fn populated_track() -> TrackModel {
    let mut track = TrackModel::new(TrackId(1), TrackKind::Video, "V1", 1_000_000);
    for i in 0..10_000 {
        track
            .insert(ItemId(i + 2), FrameRange::new(i * 50, 40))
            .expect("generated placements are disjoint");
    }
    track
}

fn bench_spatial_queries(c: &mut Criterion) {
    let track = populated_track();

    c.bench_function("clip_at_position_10k", |bencher| {
        bencher.iter(|| track.clip_at_position(black_box(250_020)));
    });

    c.bench_function("blank_size_at_10k", |bencher| {
        bencher.iter(|| track.blank_size_at(black_box(250_045)));
    });

    c.bench_function("clips_in_range_10k", |bencher| {
        bencher.iter(|| track.clips_in_range(black_box(100_000), black_box(102_000)));
    });

    c.bench_function("check_free_10k", |bencher| {
        bencher.iter(|| track.check_free(black_box(FrameRange::new(250_040, 10)), None));
    });
}

fn bench_move(c: &mut Criterion) {
    c.bench_function("move_item_10k", |bencher| {
        let mut track = populated_track();
        let mut flip = false;
        bencher.iter(|| {
            let target = if flip { 250_000 } else { 250_005 };
            flip = !flip;
            let _ = track.move_item(black_box(ItemId(5_002)), target);
        });
    });
}

criterion_group!(benches, bench_spatial_queries, bench_move);
criterion_main!(benches);
