// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_selection --heading-base-level=0

//! Understory Selection: a deterministic, `no_std` selection model for tree views.
//!
//! ## Overview
//!
//! This crate tracks which nodes of a hierarchy are selected and reports the minimal
//! [`Selected`](crate::types::SelectionEvent::Selected) /
//! [`Deselected`](crate::types::SelectionEvent::Deselected) transitions for each gesture.
//! It does not know what a node is.
//! Instead, it asks a [`RangeLookup`](crate::types::RangeLookup) for the nodes between two
//! endpoints and a [`ParentLookup`](crate::types::ParentLookup) for ancestry.
//!
//! ## Gestures
//!
//! - Click: [`Selection::select`](crate::selection::Selection::select) replaces the selection and moves the anchor.
//! - Ctrl-click: [`Selection::toggle`](crate::selection::Selection::toggle) flips one node and moves the anchor.
//! - Shift-click: [`Selection::extend_to`](crate::selection::Selection::extend_to) selects the range from the anchor
//!   to the clicked node and keeps the anchor, so repeated shift-clicks pivot around the same node.
//!
//! ## Acting on a selection
//!
//! Deleting or moving a multi-selection should touch each subtree once.
//! [`top_level`](crate::selection::top_level) drops every node whose ancestor is also selected.
//!
//! ## Integration with Understory Node Tree
//!
//! With the `node_tree_adapter` feature, `understory_node_tree::Tree` implements both lookup traits,
//! so a shift-click selects the document-order range computed by `Tree::nodes_between`.
//!
//! ## Minimal example
//!
//! ```
//! use understory_selection::selection::Selection;
//! use understory_selection::types::{RangeLookup, SelectionEvent};
//!
//! // Rows of a flat list view.
//! struct Rows;
//! impl RangeLookup<u32> for Rows {
//!     type Error = core::convert::Infallible;
//!     fn range(&self, from: &u32, to: &u32) -> Result<Vec<u32>, Self::Error> {
//!         Ok((*from.min(to)..=*from.max(to)).collect())
//!     }
//! }
//!
//! let mut sel = Selection::new();
//! assert_eq!(sel.select(3), vec![SelectionEvent::Selected(3)]);
//! let events = sel.extend_to(5, &Rows).unwrap();
//! assert_eq!(events, vec![SelectionEvent::Selected(4), SelectionEvent::Selected(5)]);
//! let events = sel.extend_to(2, &Rows).unwrap();
//! assert_eq!(
//!     events,
//!     vec![
//!         SelectionEvent::Deselected(4),
//!         SelectionEvent::Deselected(5),
//!         SelectionEvent::Selected(2),
//!     ]
//! );
//! assert_eq!(sel.nodes(), &[2, 3]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod adapters;
pub mod selection;
pub mod types;
