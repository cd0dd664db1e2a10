// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visibility propagation.
//!
//! Each node caches `parent_visible`, the effective visibility of its parent
//! chain. Changing a node's own flag, or attaching/detaching a subtree,
//! recomputes the cache for every affected descendant before the call returns.

use alloc::boxed::Box;
use alloc::vec;

use crate::Tree;
use crate::error::TreeError;
use crate::notify::{Notification, Property, PropertyChanged};
use crate::types::{NodeFlags, NodeId};
use crate::value::Value;

/// Receiver of effective-visibility changes, typically a renderer.
///
/// Called once per node whose effective visibility (own flag AND parent
/// visibility) actually changed, for groups and leaves alike.
pub trait VisualSink {
    /// Show or hide the content of `node`.
    fn set_visible(&mut self, node: NodeId, visible: bool);
}

impl<F: FnMut(NodeId, bool)> VisualSink for F {
    fn set_visible(&mut self, node: NodeId, visible: bool) {
        self(node, visible);
    }
}

impl Tree {
    /// Install the sink that receives effective-visibility changes.
    pub fn set_visual_sink(&mut self, sink: impl VisualSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Remove and return the installed sink.
    pub fn take_visual_sink(&mut self) -> Option<Box<dyn VisualSink>> {
        self.sink.take()
    }

    /// Set a node's own visibility and propagate it to all descendants.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), TreeError> {
        let node = self.live_mut(id)?;
        let old = node.flags.contains(NodeFlags::VISIBLE);
        if old == visible {
            return Ok(());
        }
        let before = node.flags.effective();
        node.flags.set(NodeFlags::VISIBLE, visible);
        self.notifier
            .emit(Notification::Property(PropertyChanged {
                node: id,
                property: Property::Visible,
                old: Value::Bool(old),
            }));
        self.report_effective(id, before);
        self.cascade(id);
        self.flush_notifications();
        Ok(())
    }

    /// Recompute `id`'s parent visibility from its current parent and cascade.
    ///
    /// Queues notifications; the caller flushes.
    pub(crate) fn sync_parent_visible(&mut self, id: NodeId) {
        let expected = match self.node(id).parent {
            Some(p) => self.node(p).flags.effective(),
            None => true,
        };
        if self.apply_parent_visible(id, expected) {
            self.cascade(id);
        }
    }

    /// Push `root`'s effective visibility down its subtree.
    ///
    /// Stops below any node whose cached value did not change.
    fn cascade(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(p) = stack.pop() {
            let effective = self.node(p).flags.effective();
            let mut child = self.node(p).first_child;
            while let Some(c) = child {
                if self.apply_parent_visible(c, effective) {
                    stack.push(c);
                }
                child = self.node(c).next;
            }
        }
    }

    fn apply_parent_visible(&mut self, id: NodeId, parent_visible: bool) -> bool {
        let node = self.node_mut(id);
        let old = node.flags.contains(NodeFlags::PARENT_VISIBLE);
        if old == parent_visible {
            return false;
        }
        let before = node.flags.effective();
        node.flags.set(NodeFlags::PARENT_VISIBLE, parent_visible);
        self.notifier
            .emit(Notification::Property(PropertyChanged {
                node: id,
                property: Property::ParentVisible,
                old: Value::Bool(old),
            }));
        self.report_effective(id, before);
        true
    }

    fn report_effective(&mut self, id: NodeId, before: bool) {
        let now = self.node(id).flags.effective();
        if now != before
            && let Some(sink) = self.sink.as_mut()
        {
            sink.set_visible(id, now);
        }
    }
}
