// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the node tree: handles, persistent ids, flags, and node kinds.

use alloc::string::String;
use core::fmt;

use kurbo::Affine;
use serde::{Deserialize, Serialize};

/// Handle for a node in the tree.
///
/// This is a small, copyable handle that stays stable across updates but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On creation, a fresh slot is allocated with generation `1`.
/// - On [`dispose`](crate::Tree::dispose), the slot is freed; any existing `NodeId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// A `NodeId` is only meaningful for the [`Tree`](crate::Tree) that produced it.
/// It is not persisted; use [`Uid`] for identity that survives serialization.
///
/// ### Liveness
///
/// Use [`Tree::is_alive`](crate::Tree::is_alive) to check whether a `NodeId` still refers to a live node.
/// Stale `NodeId`s never alias a different live node because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Persistent identity of a node, unique within one tree.
///
/// Freshly generated ids are 32 lowercase hex digits (a v4 UUID without dashes),
/// but any string supplied by the caller is accepted.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let mut buf = uuid::Uuid::encode_buffer();
        let s = uuid::Uuid::new_v4().simple().encode_lower(&mut buf);
        Self(String::from(&*s))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Self(String::from(value))
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

bitflags::bitflags! {
    /// Per-node visibility bits.
    ///
    /// A node is effectively visible only when both bits are set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The node's own visibility, set by the user.
        const VISIBLE        = 0b0000_0001;
        /// Cached effective visibility of the parent chain. Always set on roots.
        const PARENT_VISIBLE = 0b0000_0010;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::PARENT_VISIBLE
    }
}

impl NodeFlags {
    /// Own visibility AND parent visibility.
    pub const fn effective(self) -> bool {
        self.contains(Self::VISIBLE.union(Self::PARENT_VISIBLE))
    }
}

/// Data carried by leaf nodes (renderable content).
#[derive(Clone, Debug, PartialEq)]
pub struct LeafData {
    /// Local transform relative to the parent group.
    pub transform: Affine,
    /// Material reference; empty when unassigned.
    pub material_id: String,
}

impl Default for LeafData {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            material_id: String::new(),
        }
    }
}

/// What a node is, fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// An ordered container of child nodes.
    Group,
    /// A childless node with renderable content.
    Leaf(LeafData),
}

impl NodeKind {
    /// Whether this kind can own children.
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group)
    }
}
