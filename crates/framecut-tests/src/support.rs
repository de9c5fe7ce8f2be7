//! Shared fixtures.

use std::sync::Arc;

use framecut_timeline::{InMemoryCatalog, MediaHandle, SourceRef, TimelineConfig, TimelineItemModel};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Catalog with a 500-frame AV source `"av"` and a still `"still"`.
pub fn catalog() -> Arc<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    catalog.insert(SourceRef::new("av"), MediaHandle::av(500));
    catalog.insert(SourceRef::new("still"), MediaHandle::still());
    Arc::new(catalog)
}

pub fn model() -> TimelineItemModel {
    init_tracing();
    TimelineItemModel::new(catalog(), TimelineConfig::default())
}
