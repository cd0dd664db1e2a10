// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapter for Understory Node Tree.
//!
//! ## Feature
//!
//! Enable with `node_tree_adapter`.
//!
//! ## Notes
//!
//! [`Tree`] implements [`ParentLookup`] through [`Tree::parent`] and [`RangeLookup`] through
//! [`Tree::nodes_between`], so shift-click selects the document-order range as a tree view
//! shows it. A range between nodes of different trees fails with the tree's
//! [`TreeError`] and leaves the selection unchanged.
//!
//! ```
//! use understory_node_tree::{LeafData, Tree};
//! use understory_selection::selection::{Selection, top_level};
//!
//! let mut tree = Tree::new();
//! let root = tree.create_group("root");
//! let group = tree.create_group("group");
//! let a = tree.create_leaf("a", LeafData::default());
//! let b = tree.create_leaf("b", LeafData::default());
//! tree.add(root, &[group, b]).unwrap();
//! tree.add(group, &[a]).unwrap();
//!
//! let mut sel = Selection::new();
//! let _ = sel.select(group);
//! let _ = sel.extend_to(b, &tree).unwrap();
//! assert_eq!(sel.nodes(), &[group, a, b]);
//! assert_eq!(top_level(sel.nodes(), &tree), vec![group, b]);
//! ```

use alloc::vec::Vec;

use understory_node_tree::{NodeId, Tree, TreeError};

use crate::types::{ParentLookup, RangeLookup};

impl ParentLookup<NodeId> for Tree {
    fn parent_of(&self, node: &NodeId) -> Option<NodeId> {
        self.parent(*node)
    }
}

impl RangeLookup<NodeId> for Tree {
    type Error = TreeError;

    fn range(&self, from: &NodeId, to: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.nodes_between(*from, *to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{Selection, top_level};
    use crate::types::SelectionEvent;
    use alloc::vec;
    use understory_node_tree::{LeafData, StructuralError};

    #[test]
    fn shift_click_follows_document_order() {
        // root ── f1 ── a
        //      │     └─ b
        //      └─ c
        let mut tree = Tree::new();
        let root = tree.create_group("root");
        let f1 = tree.create_group("f1");
        let a = tree.create_leaf("a", LeafData::default());
        let b = tree.create_leaf("b", LeafData::default());
        let c = tree.create_leaf("c", LeafData::default());
        tree.add(root, &[f1, c]).unwrap();
        tree.add(f1, &[a, b]).unwrap();

        let mut sel = Selection::new();
        let _ = sel.select(c);
        let events = sel.extend_to(a, &tree).unwrap();
        assert_eq!(
            events,
            vec![SelectionEvent::Selected(a), SelectionEvent::Selected(b)]
        );
        assert_eq!(sel.nodes(), &[a, b, c]);
        assert_eq!(top_level(sel.nodes(), &tree), vec![a, b, c]);

        let _ = sel.extend_to(f1, &tree).unwrap();
        assert_eq!(sel.nodes(), &[f1, a, b, c]);
        assert_eq!(top_level(sel.nodes(), &tree), vec![f1, c], "f1 covers a and b");
    }

    #[test]
    fn range_across_trees_is_rejected() {
        let mut tree = Tree::new();
        let r1 = tree.create_group("r1");
        let r2 = tree.create_group("r2");

        let mut sel = Selection::new();
        let _ = sel.select(r1);
        assert_eq!(
            sel.extend_to(r2, &tree),
            Err(StructuralError::Disjoint { a: r1, b: r2 }.into())
        );
        assert_eq!(sel.nodes(), &[r1]);
    }
}
