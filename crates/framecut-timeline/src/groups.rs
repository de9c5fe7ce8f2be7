//! Groups model: a forest over item ids capturing "move together" relations.
//!
//! Leaves are items, inner nodes are groups. The forest is independent of
//! track topology. Every group has at least two children; a group that drops
//! below that collapses and its remaining child takes its place.
//!
//! At most one `Selection` group exists. It is always a root and wraps the
//! roots of the currently selected items.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, IdAllocator, ItemId};

/// A node of the group forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupMember {
    Item(ItemId),
    Group(GroupId),
}

impl From<ItemId> for GroupMember {
    fn from(id: ItemId) -> Self {
        Self::Item(id)
    }
}

impl From<GroupId> for GroupMember {
    fn from(id: GroupId) -> Self {
        Self::Group(id)
    }
}

/// Kind of group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupType {
    /// User-created group.
    Normal,
    /// Audio/video halves of one source that always move together.
    AvSplit,
    /// Transient group over the current selection.
    Selection,
}

impl GroupType {
    pub fn is_persistent(self) -> bool {
        self != GroupType::Selection
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupsModel {
    parent: HashMap<GroupMember, GroupId>,
    children: HashMap<GroupId, BTreeSet<GroupMember>>,
    types: HashMap<GroupId, GroupType>,
    selection: Option<GroupId>,
}

impl GroupsModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of group nodes.
    pub fn group_count(&self) -> usize {
        self.children.len()
    }

    pub fn parent_of(&self, member: impl Into<GroupMember>) -> Option<GroupId> {
        self.parent.get(&member.into()).copied()
    }

    pub fn group_type(&self, group: GroupId) -> Option<GroupType> {
        self.types.get(&group).copied()
    }

    pub fn members(&self, group: GroupId) -> Option<&BTreeSet<GroupMember>> {
        self.children.get(&group)
    }

    pub fn selection_group(&self) -> Option<GroupId> {
        self.selection
    }

    /// Topmost ancestor of `member`, or the member itself when ungrouped.
    pub fn root_of(&self, member: impl Into<GroupMember>) -> GroupMember {
        let mut current = member.into();
        while let Some(parent) = self.parent.get(&current) {
            current = GroupMember::Group(*parent);
        }
        current
    }

    /// Topmost ancestor that is not the selection group.
    pub fn persistent_root_of(&self, member: impl Into<GroupMember>) -> GroupMember {
        let mut current = member.into();
        while let Some(parent) = self.parent.get(&current) {
            if Some(*parent) == self.selection {
                break;
            }
            current = GroupMember::Group(*parent);
        }
        current
    }

    /// True if the item belongs to a persistent group.
    pub fn is_in_group(&self, item: ItemId) -> bool {
        self.parent_of(item)
            .is_some_and(|parent| Some(parent) != self.selection)
    }

    /// True if the item sits under the selection group.
    pub fn is_in_selection(&self, item: ItemId) -> bool {
        match (self.root_of(item), self.selection) {
            (GroupMember::Group(root), Some(selection)) => root == selection,
            _ => false,
        }
    }

    /// All items below `member` (the item itself for a leaf).
    pub fn leaves(&self, member: impl Into<GroupMember>) -> BTreeSet<ItemId> {
        let mut out = BTreeSet::new();
        let mut stack = vec![member.into()];
        while let Some(node) = stack.pop() {
            match node {
                GroupMember::Item(id) => {
                    out.insert(id);
                }
                GroupMember::Group(gid) => {
                    if let Some(kids) = self.children.get(&gid) {
                        stack.extend(kids.iter().copied());
                    }
                }
            }
        }
        out
    }

    /// Items that move together with `item` (its whole root group).
    pub fn move_set(&self, item: ItemId) -> BTreeSet<ItemId> {
        self.leaves(self.root_of(item))
    }

    /// Items that move together with `item`, ignoring the selection group.
    pub fn persistent_move_set(&self, item: ItemId) -> BTreeSet<ItemId> {
        self.leaves(self.persistent_root_of(item))
    }

    /// Group the given items under a new covering group.
    ///
    /// Items already grouped bring their whole persistent root along, so no
    /// member is ever dropped. When every item already shares one root, that
    /// root is reused. Returns `None` when fewer than two roots exist and
    /// there is no group to reuse.
    pub fn group(
        &mut self,
        items: &BTreeSet<ItemId>,
        kind: GroupType,
        ids: &mut IdAllocator,
    ) -> Option<GroupId> {
        if kind == GroupType::Selection {
            self.clear_selection();
        }
        let roots: BTreeSet<GroupMember> = items
            .iter()
            .map(|item| self.persistent_root_of(*item))
            .collect();
        if roots.len() < 2 {
            return match roots.into_iter().next() {
                Some(GroupMember::Group(existing)) if kind != GroupType::Selection => {
                    Some(existing)
                }
                _ => None,
            };
        }
        if kind != GroupType::Selection {
            // The new group replaces the selection's view of its roots.
            self.clear_selection();
        }
        let gid = ids.group();
        for root in &roots {
            self.parent.insert(*root, gid);
        }
        self.children.insert(gid, roots);
        self.types.insert(gid, kind);
        if kind == GroupType::Selection {
            self.selection = Some(gid);
        }
        Some(gid)
    }

    /// Dissolve the selection group, if any.
    pub fn clear_selection(&mut self) -> bool {
        match self.selection.take() {
            Some(gid) => {
                self.dissolve(gid);
                true
            }
            None => false,
        }
    }

    /// Detach `item` from its smallest enclosing persistent group.
    ///
    /// The remaining members stay grouped while at least two are left.
    /// Returns false when the item was not in a persistent group.
    pub fn ungroup_item(&mut self, item: ItemId) -> bool {
        if !self.is_in_group(item) {
            return false;
        }
        self.clear_selection();
        self.detach(GroupMember::Item(item));
        true
    }

    /// Remove `member` from its parent, collapsing groups left too small.
    pub fn detach(&mut self, member: GroupMember) {
        let Some(parent) = self.parent.remove(&member) else {
            return;
        };
        if let Some(kids) = self.children.get_mut(&parent) {
            kids.remove(&member);
        }
        self.collapse_if_small(parent);
    }

    /// Forget an item entirely (used on deletion).
    pub fn remove_item(&mut self, item: ItemId) {
        self.detach(GroupMember::Item(item));
    }

    /// Make `member` a child of `group`.
    pub fn attach(&mut self, member: GroupMember, group: GroupId) {
        if !self.children.contains_key(&group) {
            return;
        }
        self.detach(member);
        if let Some(kids) = self.children.get_mut(&group) {
            kids.insert(member);
            self.parent.insert(member, group);
        }
    }

    /// Dissolve a whole group node; its children take its place.
    pub fn dissolve(&mut self, group: GroupId) {
        let Some(kids) = self.children.remove(&group) else {
            return;
        };
        self.types.remove(&group);
        if self.selection == Some(group) {
            self.selection = None;
        }
        let grandparent = self.parent.remove(&GroupMember::Group(group));
        if let Some(gp) = grandparent {
            if let Some(siblings) = self.children.get_mut(&gp) {
                siblings.remove(&GroupMember::Group(group));
            }
        }
        for kid in kids {
            match grandparent {
                Some(gp) => {
                    self.parent.insert(kid, gp);
                    if let Some(siblings) = self.children.get_mut(&gp) {
                        siblings.insert(kid);
                    }
                }
                None => {
                    self.parent.remove(&kid);
                }
            }
        }
        if let Some(gp) = grandparent {
            self.collapse_if_small(gp);
        }
    }

    fn collapse_if_small(&mut self, group: GroupId) {
        if self.children.get(&group).is_some_and(|kids| kids.len() < 2) {
            self.dissolve(group);
        }
    }

    /// Check structural invariants; returns a description of the first breach.
    pub fn validate(&self) -> Result<(), String> {
        for (gid, kids) in &self.children {
            if kids.len() < 2 {
                return Err(format!("{gid} has {} children", kids.len()));
            }
            for kid in kids {
                if self.parent.get(kid) != Some(gid) {
                    return Err(format!("{kid:?} not linked back to {gid}"));
                }
            }
        }
        for (member, parent) in &self.parent {
            if !self.children.get(parent).is_some_and(|k| k.contains(member)) {
                return Err(format!("{member:?} missing from {parent}"));
            }
            // Walking up must terminate within the number of groups.
            let mut current = *member;
            let mut steps = 0;
            while let Some(p) = self.parent.get(&current) {
                current = GroupMember::Group(*p);
                steps += 1;
                if steps > self.children.len() {
                    return Err(format!("cycle above {member:?}"));
                }
            }
        }
        if let Some(sel) = self.selection {
            if self.parent.contains_key(&GroupMember::Group(sel)) {
                return Err("selection group is not a root".into());
            }
        }
        Ok(())
    }
}
