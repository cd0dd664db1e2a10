// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_node_tree --heading-base-level=0

//! Understory Node Tree: the document model behind a CAD or vector editor's scene panel.
//!
//! - Represents a document as a forest of groups (ordered containers) and leaves (renderable content).
//! - Keeps the parent, child, and sibling links consistent under add, remove, insert, and move.
//! - Propagates visibility down the hierarchy and reports effective changes to a renderer.
//! - Emits property and children notifications after each mutation settles.
//! - Answers range queries ([`Tree::nodes_between`]) for shift-click selection in a tree view.
//! - Flattens a subtree into serde records and rebuilds it, and clones nodes.
//!
//! ## Where this fits
//!
//! The node tree is the *document* structure: what exists, how it is grouped, and what the user
//! named and hid. It does not compute bounds or hit-test (see a box tree for that) and does not
//! draw. A renderer listens through [`VisualSink`]; a UI listens through [`Tree::subscribe`].
//!
//! ## Handles and ids
//!
//! Nodes live in an arena owned by the [`Tree`] and are addressed by [`NodeId`], a generational
//! handle that goes stale when its node is disposed. Each node also carries a [`Uid`], a
//! persistent string id that survives [`Tree::flatten`] and [`Tree::rebuild`].
//!
//! ## Mutation and notifications
//!
//! Structural operations validate everything up front and either fully apply or return a
//! [`TreeError`] with the tree untouched. Once the links are updated and visibility has been
//! recomputed, queued [`Notification`]s are delivered. Observers receive `&mut Tree`, so they may
//! mutate again; notifications produced by their mutations are delivered after the current ones.
//!
//! ## Visibility
//!
//! A node is drawn when its own flag and the cached visibility of its parent chain are both set.
//! Hiding a group hides its descendants without touching their own flags.
//!
//! ## Example
//!
//! ```rust
//! use understory_node_tree::{LeafData, Tree};
//!
//! let mut tree = Tree::new();
//! let doc = tree.create_group("doc");
//! let walls = tree.create_group("walls");
//! let a = tree.create_leaf("a", LeafData::default());
//! let b = tree.create_leaf("b", LeafData::default());
//! let c = tree.create_leaf("c", LeafData::default());
//! tree.add(doc, &[walls, c]).unwrap();
//! tree.add(walls, &[a, b]).unwrap();
//!
//! // Shift-click from `a` to `c` in document order.
//! assert_eq!(tree.nodes_between(a, c).unwrap(), vec![a, b, c]);
//!
//! // Hiding a group hides everything below it.
//! tree.set_visible(walls, false).unwrap();
//! assert_eq!(tree.effective_visible(a), Some(false));
//! assert_eq!(tree.visible(a), Some(true));
//!
//! // Moving `c` in front of `walls`.
//! tree.insert_before(doc, Some(walls), c).unwrap();
//! assert_eq!(tree.children(doc).collect::<Vec<_>>(), vec![c, walls]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.
//! The `std` feature (on by default) enables the wall-clock default for node creation times.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod error;
mod notify;
mod select;
mod serialize;
mod tree;
mod types;
mod value;
mod visibility;

pub use error::{DeserializeWarning, InvalidOperation, InvariantViolation, StructuralError, TreeError};
pub use notify::{
    ChildAction, ChildRecord, ChildrenChanged, Notification, Property, PropertyChanged,
    SubscriptionId,
};
pub use serialize::{NodeRecord, Rebuilt, TypeTag};
pub use tree::{Children, PreOrder, Tree, TreeConfig};
pub use types::{LeafData, NodeFlags, NodeId, NodeKind, Uid};
pub use value::Value;
pub use visibility::VisualSink;
