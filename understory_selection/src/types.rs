// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for selection: lookups and events.
//!
//! ## Overview
//!
//! These traits are the only view the [`Selection`](crate::selection::Selection) has of the
//! underlying hierarchy. Implement them for your tree, or enable an adapter.

use alloc::vec::Vec;

/// A selection transition.
///
/// Returned by every mutating call on [`Selection`](crate::selection::Selection).
/// Within one call, all `Deselected` events come before all `Selected` events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectionEvent<K> {
    /// The node joined the selection.
    Selected(K),
    /// The node left the selection.
    Deselected(K),
}

/// Look up the parent of a node.
///
/// Used by [`top_level`](crate::selection::top_level) to detect selected ancestors.
pub trait ParentLookup<K> {
    /// Returns the parent of `node`, or `None` if `node` is a root.
    fn parent_of(&self, node: &K) -> Option<K>;
}

/// Enumerate the nodes between two endpoints, as a view lists them.
///
/// Used by [`Selection::extend_to`](crate::selection::Selection::extend_to) for shift-click.
pub trait RangeLookup<K> {
    /// Why a range could not be computed (for example, endpoints in different trees).
    type Error;

    /// Returns every node from `from` to `to` inclusive, in display order.
    ///
    /// The order of the endpoints in the call does not matter to the result's membership.
    fn range(&self, from: &K, to: &K) -> Result<Vec<K>, Self::Error>;
}
