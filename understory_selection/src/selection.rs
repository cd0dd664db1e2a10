// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Selection state: an ordered set of nodes plus an anchor for range gestures.
//!
//! ## Usage
//!
//! 1) Map a click to [`Selection::select`], a ctrl-click to [`Selection::toggle`],
//!    and a shift-click to [`Selection::extend_to`].
//! 2) Apply the returned [`SelectionEvent`]s to your view (highlight, unhighlight).
//! 3) Before deleting or moving the selection, reduce it with [`top_level`].
//!
//! ## Minimal example
//!
//! ```
//! use understory_selection::selection::Selection;
//! use understory_selection::types::SelectionEvent;
//! let mut sel: Selection<u32> = Selection::new();
//! assert_eq!(sel.toggle(1), vec![SelectionEvent::Selected(1)]);
//! assert_eq!(sel.toggle(2), vec![SelectionEvent::Selected(2)]);
//! assert_eq!(sel.select(2), vec![SelectionEvent::Deselected(1)]);
//! ```

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::types::{ParentLookup, RangeLookup, SelectionEvent};

/// The selected nodes, in the order they were selected, and the anchor of the next range.
///
/// Ordering semantics:
/// - A node appears at most once.
/// - Events list every `Deselected` first, then every `Selected`, each in selection order.
/// - Calls that change nothing return no events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection<K: Copy + Ord> {
    nodes: Vec<K>,
    anchor: Option<K>,
}

impl<K: Copy + Ord> Default for Selection<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Ord> Selection<K> {
    /// Create an empty selection with no anchor.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            anchor: None,
        }
    }

    /// The selected nodes.
    pub fn nodes(&self) -> &[K] {
        &self.nodes
    }

    /// The node range gestures pivot around, if any.
    pub fn anchor(&self) -> Option<K> {
        self.anchor
    }

    /// Number of selected nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `node` is selected.
    pub fn contains(&self, node: &K) -> bool {
        self.nodes.contains(node)
    }

    /// Select only `node` and make it the anchor.
    pub fn select(&mut self, node: K) -> Vec<SelectionEvent<K>> {
        self.anchor = Some(node);
        self.replace(&[node])
    }

    /// Add `node` if absent, remove it if present; either way it becomes the anchor.
    pub fn toggle(&mut self, node: K) -> Vec<SelectionEvent<K>> {
        self.anchor = Some(node);
        match self.nodes.iter().position(|n| *n == node) {
            Some(i) => {
                self.nodes.remove(i);
                alloc::vec![SelectionEvent::Deselected(node)]
            }
            None => {
                self.nodes.push(node);
                alloc::vec![SelectionEvent::Selected(node)]
            }
        }
    }

    /// Select the range from the anchor to `node`, keeping the anchor.
    ///
    /// Without an anchor this behaves like [`Selection::select`]. If the range
    /// cannot be computed, the selection is left unchanged.
    pub fn extend_to<R: RangeLookup<K>>(
        &mut self,
        node: K,
        ranger: &R,
    ) -> Result<Vec<SelectionEvent<K>>, R::Error> {
        let Some(anchor) = self.anchor else {
            return Ok(self.select(node));
        };
        let range = ranger.range(&anchor, &node)?;
        Ok(self.replace(&range))
    }

    /// Replace the selection with `nodes`; the last one becomes the anchor.
    ///
    /// Duplicates in `nodes` are ignored after their first occurrence.
    pub fn set(&mut self, nodes: impl IntoIterator<Item = K>) -> Vec<SelectionEvent<K>> {
        let next: Vec<K> = nodes.into_iter().collect();
        self.anchor = next.last().copied();
        self.replace(&next)
    }

    /// Deselect everything and drop the anchor.
    pub fn clear(&mut self) -> Vec<SelectionEvent<K>> {
        self.anchor = None;
        self.replace(&[])
    }

    fn replace(&mut self, next: &[K]) -> Vec<SelectionEvent<K>> {
        let incoming: BTreeSet<K> = next.iter().copied().collect();
        let current: BTreeSet<K> = self.nodes.iter().copied().collect();

        let mut out: Vec<SelectionEvent<K>> = self
            .nodes
            .iter()
            .filter(|n| !incoming.contains(n))
            .map(|&n| SelectionEvent::Deselected(n))
            .collect();

        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(incoming.len());
        for &n in next {
            if !seen.insert(n) {
                continue;
            }
            if !current.contains(&n) {
                out.push(SelectionEvent::Selected(n));
            }
            kept.push(n);
        }
        self.nodes = kept;
        out
    }
}

/// The nodes of `nodes` that have no ancestor in `nodes`, in their original order.
///
/// Duplicates are dropped after their first occurrence.
pub fn top_level<K: Copy + Ord, P: ParentLookup<K>>(nodes: &[K], parents: &P) -> Vec<K> {
    let all: BTreeSet<K> = nodes.iter().copied().collect();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for &n in nodes {
        if !seen.insert(n) {
            continue;
        }
        let mut cur = parents.parent_of(&n);
        let mut covered = false;
        while let Some(p) = cur {
            if all.contains(&p) {
                covered = true;
                break;
            }
            cur = parents.parent_of(&p);
        }
        if !covered {
            out.push(n);
        }
    }
    out
}
