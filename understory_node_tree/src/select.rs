// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Range selection in document order.
//!
//! ## Overview
//!
//! [`Tree::nodes_between`] answers "what does a shift-click from `a` to `b`
//! highlight?" for a tree view that lists nodes in pre-order (a group is
//! followed by its children, then by its next sibling).
//!
//! ## Shape of the result
//!
//! - The result is the pre-order slice from the earlier node to the later one, inclusive.
//! - A group inside the slice brings all of its descendants along.
//! - When one node is an ancestor of the other, the slice starts at the ancestor.
//! - The ancestors of the earlier node are not included (they come before it).
//!
//! ## Failure
//!
//! Both nodes must hang off the same root; otherwise the query fails with
//! [`StructuralError::Disjoint`]. This is caller misuse, not a user-facing condition.

use alloc::vec;
use alloc::vec::Vec;

use crate::Tree;
use crate::error::{StructuralError, TreeError};
use crate::types::NodeId;

impl Tree {
    /// Every node between `a` and `b` in document order, both included.
    ///
    /// The result is ordered from whichever node comes first, so
    /// `nodes_between(a, b)` and `nodes_between(b, a)` hold the same nodes.
    pub fn nodes_between(&self, a: NodeId, b: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.live(a)?;
        self.live(b)?;
        if a == b {
            return Ok(vec![a]);
        }
        let path_a = self.path_to_root(a);
        let path_b = self.path_to_root(b);
        let shared = shared_tail(&path_a, &path_b);
        if shared == 0 {
            return Err(StructuralError::Disjoint { a, b }.into());
        }

        let mut out = Vec::new();
        // One path is a suffix of the other: the shorter one ends at the ancestor.
        if shared == path_a.len() || shared == path_b.len() {
            let (ancestor, descendant) = if shared == path_a.len() {
                (a, b)
            } else {
                (b, a)
            };
            self.extend_until(&mut out, ancestor, descendant);
            return Ok(out);
        }

        let branch_a = path_a[path_a.len() - shared - 1];
        let branch_b = path_b[path_b.len() - shared - 1];
        if self.precedes(branch_a, branch_b) {
            self.collect_span(&mut out, &path_a, b, shared);
        } else {
            self.collect_span(&mut out, &path_b, a, shared);
        }
        Ok(out)
    }

    /// Whether `later` is reached by walking forward from `earlier` along the sibling chain.
    fn precedes(&self, earlier: NodeId, later: NodeId) -> bool {
        let mut cur = self.node(earlier).next;
        while let Some(n) = cur {
            if n == later {
                return true;
            }
            cur = self.node(n).next;
        }
        false
    }

    /// Scan forward from the first node of `path` until `target`.
    ///
    /// `shared` is the number of trailing path entries common with `target`'s path.
    fn collect_span(&self, out: &mut Vec<NodeId>, path: &[NodeId], target: NodeId, shared: usize) {
        out.extend(self.pre_order(path[0]));

        // Rest of each enclosing group, climbing up to the branch under the common ancestor.
        let branch = path.len() - shared - 1;
        for &n in &path[..branch] {
            let mut next = self.node(n).next;
            while let Some(s) = next {
                out.extend(self.pre_order(s));
                next = self.node(s).next;
            }
        }

        let mut next = self.node(path[branch]).next;
        while let Some(s) = next {
            if self.extend_until(out, s, target) {
                return;
            }
            next = self.node(s).next;
        }
    }

    /// Append `root`'s subtree in pre-order, stopping after `until`.
    ///
    /// Returns whether `until` was reached.
    fn extend_until(&self, out: &mut Vec<NodeId>, root: NodeId, until: NodeId) -> bool {
        for n in self.pre_order(root) {
            out.push(n);
            if n == until {
                return true;
            }
        }
        false
    }
}

/// Number of trailing entries two root-ending paths have in common.
fn shared_tail(a: &[NodeId], b: &[NodeId]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}
