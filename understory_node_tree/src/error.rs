// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error and warning types.
//!
//! Fallible tree operations return [`TreeError`], which is either a
//! [`StructuralError`] (misuse that would break the tree's shape) or an
//! [`InvalidOperation`] (a caller-correctable precondition failure).
//! Failed operations never partially apply.
//!
//! [`DeserializeWarning`] is not returned as an error: rebuilding from records
//! degrades to a partial tree and reports warnings alongside the result.

use crate::types::{NodeId, Uid};

/// The operation would violate the tree's structure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// Attaching `node` under `target` would make `node` its own ancestor.
    #[error("cannot attach {node:?} under {target:?}: target is the node or one of its descendants")]
    Cycle {
        /// The node being attached.
        node: NodeId,
        /// The requested new parent.
        target: NodeId,
    },
    /// The two nodes do not belong to the same tree.
    #[error("{a:?} and {b:?} do not share a common ancestor")]
    Disjoint {
        /// First node of the query.
        a: NodeId,
        /// Second node of the query.
        b: NodeId,
    },
}

/// A precondition of the operation does not hold.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOperation {
    /// The handle does not refer to a live node.
    #[error("stale node handle {0:?}")]
    StaleNode(NodeId),
    /// The node is a leaf and cannot own children.
    #[error("{0:?} is not a group")]
    NotAGroup(NodeId),
    /// The node is not a direct child of the container.
    #[error("{node:?} is not a child of {container:?}")]
    NotAChild {
        /// The node that was expected to be a child.
        node: NodeId,
        /// The container that was named.
        container: NodeId,
    },
    /// The node is a group but the operation needs a leaf.
    #[error("{0:?} is not a leaf")]
    NotALeaf(NodeId),
    /// A node was positioned relative to itself.
    #[error("{0:?} cannot be positioned relative to itself")]
    SameNode(NodeId),
    /// A node appears more than once in one batch.
    #[error("{0:?} appears more than once")]
    DuplicateNode(NodeId),
    /// The persistent id is already used by another node.
    #[error("id {0} is already in use")]
    DuplicateUid(Uid),
    /// The node must be detached for this operation.
    #[error("{0:?} is still attached to a group")]
    Attached(NodeId),
}

/// Any failure of a tree operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// See [`StructuralError`].
    #[error(transparent)]
    Structural(#[from] StructuralError),
    /// See [`InvalidOperation`].
    #[error(transparent)]
    Invalid(#[from] InvalidOperation),
}

/// A broken tree invariant, reported by [`Tree::validate`](crate::Tree::validate).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// The node is reachable from itself through parent links.
    #[error("{0:?} is its own ancestor")]
    Cycle(NodeId),
    /// Sibling links, bounds, or child count disagree around this node.
    #[error("sibling chain broken at {0:?}")]
    Chain(NodeId),
    /// The node's parent does not list it exactly once.
    #[error("{0:?} is not in its parent's child chain")]
    Attachment(NodeId),
    /// Cached parent visibility is out of date.
    #[error("stale parent visibility at {0:?}")]
    Visibility(NodeId),
    /// The id lookup table disagrees with the node.
    #[error("id table mismatch at {0:?}")]
    Uid(NodeId),
}

/// A recoverable anomaly found while rebuilding a tree from records.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeserializeWarning {
    /// The record names a parent that has not been rebuilt yet; the node stays detached.
    #[error("record {index}: parent {parent} not found for {id}")]
    MissingParent {
        /// Position of the record in the input.
        index: usize,
        /// Id of the record.
        id: Uid,
        /// The missing parent id.
        parent: Uid,
    },
    /// The record names a parent that is a leaf; the node stays detached.
    #[error("record {index}: parent {parent} of {id} is not a group")]
    ParentNotGroup {
        /// Position of the record in the input.
        index: usize,
        /// Id of the record.
        id: Uid,
        /// The leaf named as parent.
        parent: Uid,
    },
    /// The id is already used in the tree; the record is skipped.
    #[error("record {index}: id {id} is already in use")]
    DuplicateUid {
        /// Position of the record in the input.
        index: usize,
        /// The conflicting id.
        id: Uid,
    },
    /// A property has the wrong type; the default is used instead.
    #[error("record {index}: property `{key}` of {id} has an unexpected value")]
    InvalidProperty {
        /// Position of the record in the input.
        index: usize,
        /// Id of the record.
        id: Uid,
        /// The property key.
        key: &'static str,
    },
}
