// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notifications: what changed, who hears about it, and when.
//!
//! ## Delivery
//!
//! Every mutating call queues its notifications while it runs and delivers them
//! only after the tree is consistent again (notify-after-mutate).
//! Callbacks receive `&mut Tree` and may mutate it; notifications caused by a
//! callback are queued behind the current one and delivered in order, never
//! interleaved with it.
//!
//! ## Subjects
//!
//! - [`PropertyChanged`] is about its `node`.
//! - [`ChildrenChanged`] is about its `container` and every old or new parent
//!   named in its records.
//!
//! Per-node subscribers hear each notification about their node once.
//! Tree-wide subscribers hear everything.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec;
use alloc::vec::Vec;
use log::trace;

use crate::Tree;
use crate::error::TreeError;
use crate::types::NodeId;
use crate::value::Value;

/// A node property that reports changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Property {
    /// [`Tree::set_name`].
    Name,
    /// [`Tree::set_visible`].
    Visible,
    /// Cached parent visibility, updated by propagation.
    ParentVisible,
    /// [`Tree::set_transform`].
    Transform,
    /// [`Tree::set_material_id`].
    MaterialId,
}

impl Property {
    /// The property's key in serialized records and notifications.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Visible => "visible",
            Self::ParentVisible => "parentVisible",
            Self::Transform => "transform",
            Self::MaterialId => "materialId",
        }
    }
}

/// A single property of a node changed.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChanged {
    /// The node whose property changed.
    pub node: NodeId,
    /// Which property.
    pub property: Property,
    /// The value before the change.
    pub old: Value,
}

/// What happened to a child in a structural change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChildAction {
    /// A detached node was attached.
    Add,
    /// A node was detached.
    Remove,
    /// An attached node changed group or position.
    Move,
}

/// One node's part in a structural change.
///
/// Carries both the old and the new position, enough to invert the change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChildRecord {
    /// What happened.
    pub action: ChildAction,
    /// The node that changed position.
    pub node: NodeId,
    /// Group before the change.
    pub old_parent: Option<NodeId>,
    /// Sibling before the node prior to the change.
    pub old_previous: Option<NodeId>,
    /// Group after the change.
    pub new_parent: Option<NodeId>,
    /// Sibling before the node after the change.
    pub new_previous: Option<NodeId>,
}

/// The children of a group changed; one per structural call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChildrenChanged {
    /// The group the operation was called on.
    pub container: NodeId,
    /// Per-node changes, in operation order.
    pub records: Vec<ChildRecord>,
}

/// A change reported to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// See [`PropertyChanged`].
    Property(PropertyChanged),
    /// See [`ChildrenChanged`].
    Children(ChildrenChanged),
}

impl Notification {
    /// Nodes whose per-node subscribers receive this notification, without duplicates.
    pub fn subjects(&self) -> Vec<NodeId> {
        match self {
            Self::Property(p) => vec![p.node],
            Self::Children(c) => {
                let mut out = vec![c.container];
                for r in &c.records {
                    for p in [r.old_parent, r.new_parent].into_iter().flatten() {
                        if !out.contains(&p) {
                            out.push(p);
                        }
                    }
                }
                out
            }
        }
    }
}

/// Handle returned by [`Tree::subscribe`] and [`Tree::subscribe_all`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&mut Tree, &Notification)>;

#[derive(Default)]
struct Observers {
    all: Vec<(SubscriptionId, Callback)>,
    per_node: BTreeMap<NodeId, Vec<(SubscriptionId, Callback)>>,
}

impl Observers {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        self.all.retain(|(s, _)| *s != id);
        for list in self.per_node.values_mut() {
            list.retain(|(s, _)| *s != id);
        }
        self.per_node.retain(|_, list| !list.is_empty());
        self.len() != before
    }

    fn absorb(&mut self, other: Self) {
        self.all.extend(other.all);
        for (node, list) in other.per_node {
            self.per_node.entry(node).or_default().extend(list);
        }
    }

    fn len(&self) -> usize {
        self.all.len() + self.per_node.values().map(Vec::len).sum::<usize>()
    }

    fn deliver(&mut self, tree: &mut Tree, notification: &Notification) {
        for (_, cb) in &mut self.all {
            cb(&mut *tree, notification);
        }
        for subject in notification.subjects() {
            if let Some(list) = self.per_node.get_mut(&subject) {
                for (_, cb) in list {
                    cb(&mut *tree, notification);
                }
            }
        }
    }
}

/// Subscriber storage and the pending queue.
#[derive(Default)]
pub(crate) struct Notifier {
    observers: Observers,
    pending: VecDeque<Notification>,
    dispatching: bool,
    next_id: u64,
    // Changes requested while `observers` is checked out for delivery.
    cancelled: Vec<SubscriptionId>,
    dropped: Vec<NodeId>,
}

impl core::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscriptions", &self.observers.len())
            .field("pending", &self.pending.len())
            .field("dispatching", &self.dispatching)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub(crate) fn emit(&mut self, notification: Notification) {
        trace!("queued {notification:?}");
        self.pending.push_back(notification);
    }

    /// Forget per-node subscriptions of a disposed node.
    pub(crate) fn drop_subject(&mut self, node: NodeId) {
        self.observers.per_node.remove(&node);
        if self.dispatching {
            self.dropped.push(node);
        }
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

impl Tree {
    /// Subscribe to notifications about `node`.
    ///
    /// The subscription ends with [`Tree::unsubscribe`] or when the node is disposed.
    pub fn subscribe(
        &mut self,
        node: NodeId,
        callback: impl FnMut(&mut Self, &Notification) + 'static,
    ) -> Result<SubscriptionId, TreeError> {
        self.live(node)?;
        let id = self.notifier.next_id();
        self.notifier
            .observers
            .per_node
            .entry(node)
            .or_default()
            .push((id, Box::new(callback)));
        Ok(id)
    }

    /// Subscribe to every notification of the tree.
    pub fn subscribe_all(
        &mut self,
        callback: impl FnMut(&mut Self, &Notification) + 'static,
    ) -> SubscriptionId {
        let id = self.notifier.next_id();
        self.notifier.observers.all.push((id, Box::new(callback)));
        id
    }

    /// End a subscription.
    ///
    /// Called from inside a callback, it takes effect from the next notification.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        if !self.notifier.observers.remove(id) && self.notifier.dispatching {
            self.notifier.cancelled.push(id);
        }
    }

    /// Deliver queued notifications unless a delivery is already running.
    pub(crate) fn flush_notifications(&mut self) {
        if self.notifier.dispatching {
            return;
        }
        self.notifier.dispatching = true;
        while let Some(notification) = self.notifier.pending.pop_front() {
            let mut observers = core::mem::take(&mut self.notifier.observers);
            observers.deliver(self, &notification);
            let added = core::mem::replace(&mut self.notifier.observers, observers);
            self.notifier.observers.absorb(added);
            for id in core::mem::take(&mut self.notifier.cancelled) {
                self.notifier.observers.remove(id);
            }
            for node in core::mem::take(&mut self.notifier.dropped) {
                self.notifier.observers.per_node.remove(&node);
            }
        }
        self.notifier.dispatching = false;
    }
}
