//! Media source resolution.
//!
//! The timeline never owns media; it asks the bin for a handle when an item is
//! created and caches the source length on the item.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::item::{MediaHandle, SourceRef};

/// The bin/catalog collaborator.
pub trait MediaCatalog: Send + Sync {
    /// Look up a source; `None` when the reference cannot be resolved.
    fn resolve(&self, source: &SourceRef) -> Option<MediaHandle>;
}

/// Catalog backed by a map, shared between the bin and the model.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<SourceRef, MediaHandle>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a source.
    pub fn insert(&self, source: SourceRef, handle: MediaHandle) {
        self.entries.write().insert(source, handle);
    }

    pub fn remove(&self, source: &SourceRef) -> Option<MediaHandle> {
        self.entries.write().remove(source)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MediaCatalog for InMemoryCatalog {
    fn resolve(&self, source: &SourceRef) -> Option<MediaHandle> {
        self.entries.read().get(source).cloned()
    }
}
