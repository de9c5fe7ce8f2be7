//! The user's current selection.

use std::collections::BTreeSet;

use framecut_timeline::{ItemId, TrackId};

/// Selected items in selection order, plus the track the gesture started on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<ItemId>,
    track: Option<TrackId>,
    multitrack: bool,
}

impl Selection {
    pub fn new(items: Vec<ItemId>, track: Option<TrackId>, multitrack: bool) -> Self {
        Self {
            items,
            track,
            multitrack,
        }
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn track(&self) -> Option<TrackId> {
        self.track
    }

    pub fn is_multitrack(&self) -> bool {
        self.multitrack
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains(&id)
    }

    /// The first selected item.
    pub fn first(&self) -> Option<ItemId> {
        self.items.first().copied()
    }

    /// Append `id`; returns `false` if it was already selected.
    pub fn push(&mut self, id: ItemId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.items.push(id);
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop items for which `keep` returns false.
    pub fn retain(&mut self, keep: impl FnMut(&ItemId) -> bool) {
        self.items.retain(keep);
    }

    pub fn to_set(&self) -> BTreeSet<ItemId> {
        self.items.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order_and_uniqueness() {
        let mut sel = Selection::default();
        assert!(sel.push(ItemId(4)));
        assert!(sel.push(ItemId(2)));
        assert!(!sel.push(ItemId(4)));
        assert_eq!(sel.items(), &[ItemId(4), ItemId(2)]);
        assert_eq!(sel.first(), Some(ItemId(4)));
        assert_eq!(sel.to_set().len(), 2);
    }
}
