// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: storage, structural mutation, navigation.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use kurbo::Affine;
use log::{debug, trace};

use crate::error::{InvalidOperation, InvariantViolation, StructuralError, TreeError};
use crate::notify::{
    ChildAction, ChildRecord, ChildrenChanged, Notification, Notifier, Property, PropertyChanged,
};
use crate::types::{LeafData, NodeFlags, NodeId, NodeKind, Uid};
use crate::value::Value;
use crate::visibility::VisualSink;

/// Runtime configuration for a [`Tree`].
#[derive(Clone, Copy, Debug)]
pub struct TreeConfig {
    /// Source of node creation times, in milliseconds.
    pub clock: fn() -> u64,
    /// Suffix appended to the name of a cloned node.
    pub copy_suffix: &'static str,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            clock: default_clock,
            copy_suffix: "_copy",
        }
    }
}

#[cfg(feature = "std")]
fn default_clock() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(not(feature = "std"))]
fn default_clock() -> u64 {
    0
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// A document's node tree.
///
/// Owns every node in an arena; groups own their children through intrusive
/// sibling links stored as [`NodeId`]s. Several independent roots may coexist
/// (for example a freshly created node before it is attached).
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    uids: BTreeMap<Uid, NodeId>,
    pub(crate) config: TreeConfig,
    pub(crate) sink: Option<Box<dyn VisualSink>>,
    pub(crate) notifier: Notifier,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.len();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    generation: u32,
    pub(crate) uid: Uid,
    pub(crate) name: String,
    pub(crate) flags: NodeFlags,
    pub(crate) created_time: u64,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) child_count: usize,
}

/// Where a node lands relative to its new siblings.
#[derive(Clone, Copy, Debug)]
enum Anchor {
    /// Immediately after the given sibling, or first when `None`.
    After(Option<NodeId>),
    /// Immediately before the given sibling, or last when `None`.
    Before(Option<NodeId>),
}

impl Tree {
    /// Create a new empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a new empty tree.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            uids: BTreeMap::new(),
            config,
            sink: None,
            notifier: Notifier::default(),
        }
    }

    /// The configuration this tree was created with.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Create a detached node with a freshly generated [`Uid`].
    pub fn create(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let uid = self.fresh_uid();
        self.alloc(uid, name.into(), kind)
    }

    /// Create a detached node with a caller-supplied [`Uid`].
    ///
    /// Fails with [`InvalidOperation::DuplicateUid`] if the id is taken.
    pub fn create_with_uid(
        &mut self,
        uid: Uid,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        if self.uids.contains_key(&uid) {
            debug!("create rejected: id {uid} in use");
            return Err(InvalidOperation::DuplicateUid(uid).into());
        }
        Ok(self.alloc(uid, name.into(), kind))
    }

    /// Create a detached, empty group.
    pub fn create_group(&mut self, name: impl Into<String>) -> NodeId {
        self.create(name, NodeKind::Group)
    }

    /// Create a detached leaf.
    pub fn create_leaf(&mut self, name: impl Into<String>, data: LeafData) -> NodeId {
        self.create(name, NodeKind::Leaf(data))
    }

    pub(crate) fn fresh_uid(&self) -> Uid {
        loop {
            let uid = Uid::generate();
            if !self.uids.contains_key(&uid) {
                return uid;
            }
        }
    }

    pub(crate) fn alloc(&mut self, uid: Uid, name: String, kind: NodeKind) -> NodeId {
        let mut node = Node {
            generation: 0,
            uid,
            name,
            flags: NodeFlags::default(),
            created_time: (self.config.clock)(),
            kind,
            parent: None,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
            child_count: 0,
        };
        let id = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            node.generation = generation;
            self.nodes[idx] = Some(node);
            Self::slot_id(idx, generation)
        } else {
            node.generation = 1;
            self.nodes.push(Some(node));
            self.generations.push(1);
            Self::slot_id(self.nodes.len() - 1, 1)
        };
        self.uids.insert(self.node(id).uid.clone(), id);
        trace!("created {id:?}");
        id
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "NodeId uses 32-bit indices by design."
    )]
    fn slot_id(idx: usize, generation: u32) -> NodeId {
        NodeId::new(idx as u32, generation)
    }

    /// Free a detached node and its whole subtree.
    ///
    /// All handles into the subtree become stale and their ids are released.
    /// Fails with [`InvalidOperation::Attached`] if the node still has a parent.
    pub fn dispose(&mut self, id: NodeId) -> Result<(), TreeError> {
        if self.live(id)?.parent.is_some() {
            debug!("dispose rejected: {id:?} is attached");
            return Err(InvalidOperation::Attached(id).into());
        }
        let doomed: Vec<NodeId> = self.pre_order(id).collect();
        for n in doomed {
            if let Some(node) = self.nodes[n.idx()].take() {
                self.uids.remove(&node.uid);
                self.free_list.push(n.idx());
                self.notifier.drop_subject(n);
            }
        }
        trace!("disposed subtree at {id:?}");
        Ok(())
    }

    // --- structural mutation ---

    /// Append `nodes` to `container`, in argument order.
    ///
    /// A node attached elsewhere is detached from its current group first.
    /// The whole batch is validated before anything changes.
    pub fn add(&mut self, container: NodeId, nodes: &[NodeId]) -> Result<(), TreeError> {
        self.check_add(container, nodes)
            .inspect_err(|err| debug!("add rejected: {err}"))?;
        if nodes.is_empty() {
            return Ok(());
        }
        let records: Vec<ChildRecord> = nodes
            .iter()
            .map(|&n| self.place(n, container, Anchor::Before(None)))
            .collect();
        trace!("added {nodes:?} to {container:?}");
        self.finish_structural(container, records);
        Ok(())
    }

    /// Detach `nodes` from `container`.
    ///
    /// Each node must be a direct child. Removed nodes become roots of their
    /// own (still valid) subtrees; their children are untouched.
    pub fn remove(&mut self, container: NodeId, nodes: &[NodeId]) -> Result<(), TreeError> {
        self.check_remove(container, nodes)
            .inspect_err(|err| debug!("remove rejected: {err}"))?;
        if nodes.is_empty() {
            return Ok(());
        }
        let records: Vec<ChildRecord> = nodes
            .iter()
            .map(|&n| {
                let (old_parent, old_previous) = self.unlink(n);
                ChildRecord {
                    action: ChildAction::Remove,
                    node: n,
                    old_parent,
                    old_previous,
                    new_parent: None,
                    new_previous: None,
                }
            })
            .collect();
        trace!("removed {nodes:?} from {container:?}");
        self.finish_structural(container, records);
        Ok(())
    }

    /// Insert `node` into `container` immediately before `target`.
    ///
    /// With no target the node is appended as the last child.
    pub fn insert_before(
        &mut self,
        container: NodeId,
        target: Option<NodeId>,
        node: NodeId,
    ) -> Result<(), TreeError> {
        self.check_place(container, target, node)
            .inspect_err(|err| debug!("insert_before rejected: {err}"))?;
        let record = self.place(node, container, Anchor::Before(target));
        self.finish_structural(container, alloc::vec![record]);
        Ok(())
    }

    /// Insert `node` into `container` immediately after `target`.
    ///
    /// With no target the node is inserted as the first child.
    pub fn insert_after(
        &mut self,
        container: NodeId,
        target: Option<NodeId>,
        node: NodeId,
    ) -> Result<(), TreeError> {
        self.check_place(container, target, node)
            .inspect_err(|err| debug!("insert_after rejected: {err}"))?;
        let record = self.place(node, container, Anchor::After(target));
        self.finish_structural(container, alloc::vec![record]);
        Ok(())
    }

    /// Move `child` under `new_parent`, right after `new_previous` (first when `None`).
    ///
    /// Fails with [`StructuralError::Cycle`] if `new_parent` is `child` or one of its descendants.
    pub fn move_node(
        &mut self,
        child: NodeId,
        new_parent: NodeId,
        new_previous: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.check_place(new_parent, new_previous, child)
            .inspect_err(|err| debug!("move rejected: {err}"))?;
        let record = self.place(child, new_parent, Anchor::After(new_previous));
        trace!("moved {child:?} under {new_parent:?} after {new_previous:?}");
        self.finish_structural(new_parent, alloc::vec![record]);
        Ok(())
    }

    fn check_add(&self, container: NodeId, nodes: &[NodeId]) -> Result<(), TreeError> {
        self.group(container)?;
        for (i, &n) in nodes.iter().enumerate() {
            self.live(n)?;
            if nodes[..i].contains(&n) {
                return Err(InvalidOperation::DuplicateNode(n).into());
            }
            self.check_acyclic(n, container)?;
        }
        Ok(())
    }

    fn check_remove(&self, container: NodeId, nodes: &[NodeId]) -> Result<(), TreeError> {
        self.group(container)?;
        for (i, &n) in nodes.iter().enumerate() {
            if self.live(n)?.parent != Some(container) {
                return Err(InvalidOperation::NotAChild { node: n, container }.into());
            }
            if nodes[..i].contains(&n) {
                return Err(InvalidOperation::DuplicateNode(n).into());
            }
        }
        Ok(())
    }

    fn check_place(
        &self,
        container: NodeId,
        target: Option<NodeId>,
        node: NodeId,
    ) -> Result<(), TreeError> {
        self.group(container)?;
        self.live(node)?;
        if let Some(t) = target {
            if t == node {
                return Err(InvalidOperation::SameNode(node).into());
            }
            if self.live(t)?.parent != Some(container) {
                return Err(InvalidOperation::NotAChild {
                    node: t,
                    container,
                }
                .into());
            }
        }
        self.check_acyclic(node, container)
    }

    fn check_acyclic(&self, node: NodeId, container: NodeId) -> Result<(), TreeError> {
        if node == container || self.is_ancestor(node, container) {
            return Err(StructuralError::Cycle {
                node,
                target: container,
            }
            .into());
        }
        Ok(())
    }

    /// Detach `node` (if attached) and link it into `container` at `anchor`.
    fn place(&mut self, node: NodeId, container: NodeId, anchor: Anchor) -> ChildRecord {
        let (old_parent, old_previous) = self.unlink(node);
        let prev = match anchor {
            Anchor::After(prev) => prev,
            Anchor::Before(Some(target)) => self.node(target).prev,
            Anchor::Before(None) => self.node(container).last_child,
        };
        self.link_after(node, container, prev);
        ChildRecord {
            action: if old_parent.is_some() {
                ChildAction::Move
            } else {
                ChildAction::Add
            },
            node,
            old_parent,
            old_previous,
            new_parent: Some(container),
            new_previous: prev,
        }
    }

    /// Queue the structural notification, restore visibility, then deliver.
    fn finish_structural(&mut self, container: NodeId, records: Vec<ChildRecord>) {
        let moved: Vec<NodeId> = records.iter().map(|r| r.node).collect();
        self.notifier
            .emit(Notification::Children(ChildrenChanged { container, records }));
        for n in moved {
            self.sync_parent_visible(n);
        }
        self.flush_notifications();
    }

    fn unlink(&mut self, id: NodeId) -> (Option<NodeId>, Option<NodeId>) {
        let (parent, prev, next) = {
            let n = self.node(id);
            (n.parent, n.prev, n.next)
        };
        let Some(parent) = parent else {
            return (None, None);
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.node_mut(parent).last_child = prev,
        }
        self.node_mut(parent).child_count -= 1;
        let n = self.node_mut(id);
        n.parent = None;
        n.prev = None;
        n.next = None;
        (Some(parent), prev)
    }

    fn link_after(&mut self, id: NodeId, parent: NodeId, prev: Option<NodeId>) {
        let next = match prev {
            Some(p) => self.node(p).next,
            None => self.node(parent).first_child,
        };
        match prev {
            Some(p) => self.node_mut(p).next = Some(id),
            None => self.node_mut(parent).first_child = Some(id),
        }
        match next {
            Some(n) => self.node_mut(n).prev = Some(id),
            None => self.node_mut(parent).last_child = Some(id),
        }
        self.node_mut(parent).child_count += 1;
        let n = self.node_mut(id);
        n.parent = Some(parent);
        n.prev = prev;
        n.next = next;
    }

    // --- properties ---

    /// Rename a node.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), TreeError> {
        let name = name.into();
        let node = self.live_mut(id)?;
        if node.name == name {
            return Ok(());
        }
        let old = core::mem::replace(&mut node.name, name);
        self.notify_property(id, Property::Name, Value::String(old));
        Ok(())
    }

    /// Set a leaf's local transform.
    pub fn set_transform(&mut self, id: NodeId, transform: Affine) -> Result<(), TreeError> {
        let leaf = self.leaf_mut(id)?;
        if leaf.transform == transform {
            return Ok(());
        }
        let old = core::mem::replace(&mut leaf.transform, transform);
        self.notify_property(id, Property::Transform, Value::from(old));
        Ok(())
    }

    /// Set a leaf's material reference.
    pub fn set_material_id(
        &mut self,
        id: NodeId,
        material_id: impl Into<String>,
    ) -> Result<(), TreeError> {
        let material_id = material_id.into();
        let leaf = self.leaf_mut(id)?;
        if leaf.material_id == material_id {
            return Ok(());
        }
        let old = core::mem::replace(&mut leaf.material_id, material_id);
        self.notify_property(id, Property::MaterialId, Value::String(old));
        Ok(())
    }

    pub(crate) fn notify_property(&mut self, node: NodeId, property: Property, old: Value) {
        self.notifier
            .emit(Notification::Property(PropertyChanged {
                node,
                property,
                old,
            }));
        self.flush_notifications();
    }

    // --- queries ---

    /// Returns true if `id` refers to a live node.
    ///
    /// A `NodeId` is considered live if its slot exists and its generation matches
    /// the current generation stored in that slot.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a node by its persistent id.
    pub fn get(&self, uid: &Uid) -> Option<NodeId> {
        self.uids.get(uid).copied()
    }

    /// The persistent id of a node.
    pub fn uid(&self, id: NodeId) -> Option<&Uid> {
        self.node_opt(id).map(|n| &n.uid)
    }

    /// The name of a node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node_opt(id).map(|n| n.name.as_str())
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node_opt(id).map(|n| &n.kind)
    }

    /// Whether the node is a live group.
    pub fn is_group(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some_and(|n| n.kind.is_group())
    }

    /// Visibility flags of a node.
    pub fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        self.node_opt(id).map(|n| n.flags)
    }

    /// The node's own visibility.
    pub fn visible(&self, id: NodeId) -> Option<bool> {
        self.flags(id).map(|f| f.contains(NodeFlags::VISIBLE))
    }

    /// Effective visibility of the node's parent chain.
    pub fn parent_visible(&self, id: NodeId) -> Option<bool> {
        self.flags(id).map(|f| f.contains(NodeFlags::PARENT_VISIBLE))
    }

    /// Own visibility AND parent visibility.
    pub fn effective_visible(&self, id: NodeId) -> Option<bool> {
        self.flags(id).map(NodeFlags::effective)
    }

    /// Creation time of a node, from the tree's clock.
    pub fn created_time(&self, id: NodeId) -> Option<u64> {
        self.node_opt(id).map(|n| n.created_time)
    }

    /// A leaf's local transform.
    pub fn transform(&self, id: NodeId) -> Option<Affine> {
        match &self.node_opt(id)?.kind {
            NodeKind::Leaf(leaf) => Some(leaf.transform),
            NodeKind::Group => None,
        }
    }

    /// A leaf's material reference.
    pub fn material_id(&self, id: NodeId) -> Option<&str> {
        match &self.node_opt(id)?.kind {
            NodeKind::Leaf(leaf) => Some(leaf.material_id.as_str()),
            NodeKind::Group => None,
        }
    }

    /// The group that owns the node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent
    }

    /// The sibling before the node.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.prev
    }

    /// The sibling after the node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.next
    }

    /// First child of a group.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.first_child
    }

    /// Last child of a group.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.last_child
    }

    /// Number of direct children; zero for leaves and stale handles.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.node_opt(id).map_or(0, |n| n.child_count)
    }

    /// Direct children in order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// The node followed by all of its descendants in pre-order.
    pub fn pre_order(&self, root: NodeId) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            root,
            next: self.is_alive(root).then_some(root),
        }
    }

    /// Nodes without a parent.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| match n {
            Some(n) if n.parent.is_none() => Some(Self::slot_id(i, n.generation)),
            _ => None,
        })
    }

    /// The node followed by its ancestors, ending at its root.
    ///
    /// Empty for a stale handle.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.is_alive(id).then_some(id);
        while let Some(n) = cur {
            out.push(n);
            cur = self.node(n).parent;
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.node(p).parent;
        }
        false
    }

    /// Check every structural invariant of the tree.
    ///
    /// Intended for tests and debug assertions; walks the whole arena in
    /// linear time, so it stays usable on very deep trees.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let live = self.len();
        let mut listed = alloc::vec![0_u32; self.nodes.len()];
        for (idx, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else {
                continue;
            };
            let id = Self::slot_id(idx, node.generation);
            if self.uids.get(&node.uid) != Some(&id) {
                return Err(InvariantViolation::Uid(id));
            }

            // Walk this node's child chain once: back links, owner and count.
            let mut counted = 0;
            let mut prev = None;
            let mut cur = node.first_child;
            while let Some(c) = cur {
                counted += 1;
                if counted > live {
                    return Err(InvariantViolation::Chain(id));
                }
                let child = self.node_opt(c).ok_or(InvariantViolation::Chain(id))?;
                if child.parent != Some(id) {
                    return Err(InvariantViolation::Attachment(c));
                }
                if child.prev != prev {
                    return Err(InvariantViolation::Chain(c));
                }
                listed[c.idx()] += 1;
                prev = Some(c);
                cur = child.next;
            }
            if node.last_child != prev
                || counted != node.child_count
                || (!node.kind.is_group() && counted != 0)
            {
                return Err(InvariantViolation::Chain(id));
            }

            let parent_visible = match node.parent {
                Some(p) => self
                    .node_opt(p)
                    .ok_or(InvariantViolation::Attachment(id))?
                    .flags
                    .effective(),
                None => {
                    if node.prev.is_some() || node.next.is_some() {
                        return Err(InvariantViolation::Chain(id));
                    }
                    true
                }
            };
            if node.flags.contains(NodeFlags::PARENT_VISIBLE) != parent_visible {
                return Err(InvariantViolation::Visibility(id));
            }
        }

        // Every attached node sits in its parent's chain exactly once.
        for (idx, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot
                && listed[idx] != u32::from(node.parent.is_some())
            {
                return Err(InvariantViolation::Attachment(Self::slot_id(
                    idx,
                    node.generation,
                )));
            }
        }

        // With consistent chains, a node unreachable from every root lies on
        // a parent cycle.
        let mut reached = alloc::vec![false; self.nodes.len()];
        for root in self.roots() {
            for n in self.pre_order(root).take(live) {
                reached[n.idx()] = true;
            }
        }
        for (idx, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot
                && !reached[idx]
            {
                return Err(InvariantViolation::Cycle(Self::slot_id(
                    idx,
                    node.generation,
                )));
            }
        }

        for (uid, &id) in &self.uids {
            if self.node_opt(id).map(|n| &n.uid) != Some(uid) {
                return Err(InvariantViolation::Uid(id));
            }
        }
        Ok(())
    }

    // --- internals ---

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    pub(crate) fn live(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.node_opt(id)
            .ok_or_else(|| InvalidOperation::StaleNode(id).into())
    }

    pub(crate) fn live_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.node_opt_mut(id)
            .ok_or_else(|| InvalidOperation::StaleNode(id).into())
    }

    fn group(&self, id: NodeId) -> Result<&Node, TreeError> {
        let node = self.live(id)?;
        if !node.kind.is_group() {
            return Err(InvalidOperation::NotAGroup(id).into());
        }
        Ok(node)
    }

    fn leaf_mut(&mut self, id: NodeId) -> Result<&mut LeafData, TreeError> {
        match &mut self.live_mut(id)?.kind {
            NodeKind::Leaf(leaf) => Ok(leaf),
            NodeKind::Group => Err(InvalidOperation::NotALeaf(id).into()),
        }
    }

    /// Append a freshly built node to a live group.
    ///
    /// The node must be detached and childless, so no cycle check is needed.
    pub(crate) fn attach_fresh(&mut self, container: NodeId, node: NodeId) {
        let record = self.place(node, container, Anchor::Before(None));
        self.finish_structural(container, alloc::vec![record]);
    }

    /// Next node in a pre-order walk of `root`'s subtree.
    pub(crate) fn pre_order_successor(&self, cur: NodeId, root: NodeId) -> Option<NodeId> {
        if let Some(child) = self.node(cur).first_child {
            return Some(child);
        }
        let mut n = cur;
        loop {
            if n == root {
                return None;
            }
            let node = self.node(n);
            if let Some(next) = node.next {
                return Some(next);
            }
            n = node.parent?;
        }
    }
}

/// Iterator over the direct children of a group. See [`Tree::children`].
#[derive(Clone, Debug)]
pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.node(cur).next;
        Some(cur)
    }
}

/// Pre-order iterator over a subtree. See [`Tree::pre_order`].
#[derive(Clone, Debug)]
pub struct PreOrder<'a> {
    tree: &'a Tree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.pre_order_successor(cur, self.root);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn leaf(tree: &mut Tree, name: &str) -> NodeId {
        tree.create_leaf(name, LeafData::default())
    }

    fn names(tree: &Tree, ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| String::from(tree.name(id).unwrap()))
            .collect()
    }

    #[test]
    fn add_appends_in_order() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let c = leaf(&mut tree, "c");
        tree.add(root, &[a, b]).unwrap();
        tree.add(root, &[c]).unwrap();

        assert_eq!(
            names(&tree, tree.children(root)),
            ["a", "b", "c"],
            "batches append in argument order"
        );
        assert_eq!(tree.first_child(root), Some(a));
        assert_eq!(tree.last_child(root), Some(c), "second add lands at the tail");
        assert_eq!(tree.child_count(root), 3);
        assert_eq!(tree.previous_sibling(b), Some(a));
        assert_eq!(tree.next_sibling(b), Some(c), "b links to the later batch");
        assert_eq!(tree.parent(c), Some(root));
        tree.validate().unwrap();
    }

    #[test]
    fn add_detaches_from_previous_group() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let f1 = tree.create_group("f1");
        let f2 = tree.create_group("f2");
        let a = leaf(&mut tree, "a");
        tree.add(root, &[f1, f2]).unwrap();
        tree.add(f1, &[a]).unwrap();
        tree.add(f2, &[a]).unwrap();

        assert_eq!(tree.child_count(f1), 0);
        assert_eq!(tree.first_child(f1), None);
        assert_eq!(tree.parent(a), Some(f2));
        tree.validate().unwrap();
    }

    #[test]
    fn add_rejects_whole_batch() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let a = leaf(&mut tree, "a");
        let err = tree.add(root, &[a, a]).unwrap_err();
        assert_eq!(err, InvalidOperation::DuplicateNode(a).into());
        assert_eq!(tree.child_count(root), 0, "nothing may be attached on failure");

        let err = tree.add(a, &[root]).unwrap_err();
        assert_eq!(err, InvalidOperation::NotAGroup(a).into());
    }

    #[test]
    fn add_ancestor_into_descendant_is_a_cycle() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let inner = tree.create_group("inner");
        tree.add(root, &[inner]).unwrap();
        let err = tree.add(inner, &[root]).unwrap_err();
        assert_eq!(
            err,
            StructuralError::Cycle {
                node: root,
                target: inner
            }
            .into()
        );
        let err = tree.add(inner, &[inner]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::Structural(StructuralError::Cycle { .. })
        ));
        tree.validate().unwrap();
    }

    #[test]
    fn remove_requires_direct_children() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let inner = tree.create_group("inner");
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        tree.add(root, &[inner, b]).unwrap();
        tree.add(inner, &[a]).unwrap();

        let err = tree.remove(root, &[b, a]).unwrap_err();
        assert_eq!(
            err,
            InvalidOperation::NotAChild {
                node: a,
                container: root
            }
            .into()
        );
        assert_eq!(tree.parent(b), Some(root), "failed batch must not detach b");

        tree.remove(root, &[inner]).unwrap();
        assert_eq!(tree.parent(inner), None);
        assert_eq!(tree.parent(a), Some(inner), "removed subtree stays intact");
        assert_eq!(names(&tree, tree.children(root)), ["b"]);
        assert_eq!(tree.previous_sibling(b), None);
        tree.validate().unwrap();
    }

    #[test]
    fn insert_before_and_after() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let c = leaf(&mut tree, "c");
        let d = leaf(&mut tree, "d");
        let e = leaf(&mut tree, "e");
        tree.insert_before(root, None, b).unwrap();
        tree.insert_before(root, Some(b), a).unwrap();
        tree.insert_after(root, Some(b), d).unwrap();
        tree.insert_before(root, Some(d), c).unwrap();
        tree.insert_after(root, None, e).unwrap();
        assert_eq!(names(&tree, tree.children(root)), ["e", "a", "b", "c", "d"]);

        // Reposition within the same group.
        tree.insert_after(root, Some(d), e).unwrap();
        assert_eq!(names(&tree, tree.children(root)), ["a", "b", "c", "d", "e"]);
        tree.validate().unwrap();

        assert_eq!(
            tree.insert_after(root, Some(a), a).unwrap_err(),
            InvalidOperation::SameNode(a).into()
        );
        let stray = leaf(&mut tree, "stray");
        assert_eq!(
            tree.insert_before(root, Some(stray), a).unwrap_err(),
            InvalidOperation::NotAChild {
                node: stray,
                container: root
            }
            .into()
        );
    }

    #[test]
    fn move_node_updates_both_groups() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let p = tree.create_group("p");
        let q = tree.create_group("q");
        let x = leaf(&mut tree, "x");
        let y = leaf(&mut tree, "y");
        let z = leaf(&mut tree, "z");
        tree.add(root, &[p, q]).unwrap();
        tree.add(p, &[x]).unwrap();
        tree.add(q, &[y, z]).unwrap();

        tree.move_node(x, q, Some(y)).unwrap();
        assert_eq!(tree.parent(x), Some(q));
        assert_eq!(tree.next_sibling(y), Some(x));
        assert_eq!(tree.child_count(p), 0);
        assert_eq!(tree.child_count(q), 3);
        assert_eq!(names(&tree, tree.children(q)), ["y", "x", "z"]);

        tree.move_node(z, q, None).unwrap();
        assert_eq!(names(&tree, tree.children(q)), ["z", "y", "x"]);
        tree.validate().unwrap();
    }

    #[test]
    fn move_into_own_subtree_fails() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let p = tree.create_group("p");
        let inner = tree.create_group("inner");
        tree.add(root, &[p]).unwrap();
        tree.add(p, &[inner]).unwrap();

        let err = tree.move_node(p, inner, None).unwrap_err();
        assert_eq!(
            err,
            StructuralError::Cycle {
                node: p,
                target: inner
            }
            .into()
        );
        assert!(tree.move_node(p, p, None).is_err());
        assert_eq!(tree.parent(p), Some(root));
        tree.validate().unwrap();
    }

    #[test]
    fn paths_and_ancestry() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let f = tree.create_group("f");
        let a = leaf(&mut tree, "a");
        tree.add(root, &[f]).unwrap();
        tree.add(f, &[a]).unwrap();

        assert_eq!(tree.path_to_root(a), vec![a, f, root]);
        assert!(tree.is_ancestor(root, a));
        assert!(!tree.is_ancestor(a, root));
        assert!(!tree.is_ancestor(a, a));
        assert_eq!(tree.pre_order(root).collect::<Vec<_>>(), vec![root, f, a]);
        assert_eq!(tree.roots().collect::<Vec<_>>(), vec![root]);
    }

    #[test]
    fn uid_lookup_and_duplicates() {
        let mut tree = Tree::new();
        let a = tree
            .create_with_uid(Uid::from("a-id"), "a", NodeKind::Group)
            .unwrap();
        assert_eq!(tree.get(&Uid::from("a-id")), Some(a));
        let err = tree
            .create_with_uid(Uid::from("a-id"), "again", NodeKind::Group)
            .unwrap_err();
        assert_eq!(err, InvalidOperation::DuplicateUid(Uid::from("a-id")).into());

        let fresh = tree.create_group("b");
        let uid = tree.uid(fresh).unwrap();
        assert_eq!(uid.as_str().len(), 32);
        assert!(uid.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn dispose_frees_subtree_and_reuses_slots() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let f = tree.create_group("f");
        let a = leaf(&mut tree, "a");
        tree.add(root, &[f]).unwrap();
        tree.add(f, &[a]).unwrap();

        assert_eq!(
            tree.dispose(f).unwrap_err(),
            InvalidOperation::Attached(f).into()
        );
        let a_uid = tree.uid(a).unwrap().clone();
        tree.remove(root, &[f]).unwrap();
        tree.dispose(f).unwrap();
        assert!(!tree.is_alive(f));
        assert!(!tree.is_alive(a));
        assert_eq!(tree.get(&a_uid), None);
        assert_eq!(tree.len(), 1);

        let b = leaf(&mut tree, "b");
        assert!(tree.is_alive(b));
        assert!(!tree.is_alive(a), "stale handles must not alias reused slots");
        tree.validate().unwrap();
    }

    #[test]
    fn property_setters() {
        let mut tree = Tree::new();
        let a = leaf(&mut tree, "a");
        let g = tree.create_group("g");
        tree.set_name(a, "renamed").unwrap();
        assert_eq!(tree.name(a), Some("renamed"));

        let tf = Affine::translate((3.0, 4.0));
        tree.set_transform(a, tf).unwrap();
        tree.set_material_id(a, "steel").unwrap();
        assert_eq!(tree.transform(a), Some(tf));
        assert_eq!(tree.material_id(a), Some("steel"));

        assert_eq!(
            tree.set_transform(g, tf).unwrap_err(),
            InvalidOperation::NotALeaf(g).into()
        );
        assert_eq!(tree.transform(g), None);
    }

    #[test]
    fn created_time_uses_configured_clock() {
        let mut tree = Tree::with_config(TreeConfig {
            clock: || 42,
            ..TreeConfig::default()
        });
        let a = tree.create_group("a");
        assert_eq!(tree.created_time(a), Some(42));
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let a = leaf(&mut tree, "a");
        tree.dispose(a).unwrap();
        assert_eq!(
            tree.add(root, &[a]).unwrap_err(),
            InvalidOperation::StaleNode(a).into()
        );
        assert_eq!(tree.name(a), None);
        assert!(tree.path_to_root(a).is_empty());
        assert_eq!(tree.pre_order(a).count(), 0);
    }

    #[test]
    fn validate_reports_parent_cycles() {
        let mut tree = Tree::new();
        let x = tree.create_group("x");
        let y = tree.create_group("y");
        tree.validate().unwrap();
        // Two groups that each list the other as their only child.
        for (child, parent) in [(x, y), (y, x)] {
            tree.node_mut(child).parent = Some(parent);
            let p = tree.node_mut(parent);
            p.first_child = Some(child);
            p.last_child = Some(child);
            p.child_count = 1;
        }
        assert!(
            matches!(tree.validate(), Err(InvariantViolation::Cycle(_))),
            "chains are consistent, so only the cycle check can catch this"
        );
    }

    #[test]
    fn deep_nesting_survives_every_walk() {
        const DEPTH: usize = 100_000;
        let mut tree = Tree::new();
        let bottom = leaf(&mut tree, "bottom");
        // Built bottom-up, so each attach targets a fresh root.
        let mut top = bottom;
        for i in 0..DEPTH {
            let g = tree.create_group(alloc::format!("g{i}"));
            tree.add(g, &[top]).unwrap();
            top = g;
        }
        let root = tree.create_group("root");
        let tail = leaf(&mut tree, "tail");
        tree.add(root, &[top, tail]).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.path_to_root(bottom).len(), DEPTH + 2);

        assert_eq!(
            tree.nodes_between(tail, bottom).unwrap(),
            vec![bottom, tail],
            "nothing lies between the deepest leaf and the next branch"
        );
        let span = tree.nodes_between(root, bottom).unwrap();
        assert_eq!(span.len(), DEPTH + 2, "root, every group, then the leaf");
        assert_eq!(span.last(), Some(&bottom));

        tree.set_visible(root, false).unwrap();
        assert_eq!(
            tree.effective_visible(bottom),
            Some(false),
            "hiding the root reaches the deepest leaf"
        );
        assert_eq!(tree.visible(bottom), Some(true));
        tree.validate().unwrap();

        let records = tree.flatten(root).unwrap();
        assert_eq!(records.len(), DEPTH + 3);
        let mut copy = Tree::new();
        let rebuilt = copy.rebuild(&records);
        assert!(rebuilt.warnings.is_empty(), "{:?}", rebuilt.warnings.first());
        copy.validate().unwrap();
        let copied = copy.get(tree.uid(bottom).unwrap()).unwrap();
        assert_eq!(copy.path_to_root(copied).len(), DEPTH + 2);
        assert_eq!(copy.effective_visible(copied), Some(false));

        tree.dispose(root).unwrap();
        assert!(tree.is_empty(), "dispose frees the whole chain");
        tree.validate().unwrap();
    }
}
