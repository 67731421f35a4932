// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capability traits a backend implements to serve as the point or rectangle half
//! of a [`HybridIndex`](crate::HybridIndex).
//!
//! - [`Hierarchy`]: counting, bounds, clearing, and parent/child enumeration.
//! - [`PointIndex`]: zero-area items at exact locations inside a domain.
//! - [`RectIndex`]: items keyed by an arbitrary AABB.
//!
//! Visitors return [`ControlFlow`]; `Break(())` stops the walk and is passed back
//! to the caller so layered indexes can propagate the stop.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::ControlFlow;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::TraversalError;
use crate::types::{Aabb2D, Scalar};

/// One entry returned from a child enumeration.
#[derive(Debug)]
pub enum Child<'a, T, P, N> {
    /// A stored item. Terminal: it has no children.
    Item {
        /// The item's box (degenerate for points).
        bbox: Aabb2D<T>,
        /// The item's payload.
        data: &'a P,
    },
    /// An internal node. Pass `node` back to the same index to descend.
    Node {
        /// Bounds of everything below this node.
        bbox: Aabb2D<T>,
        /// Opaque handle.
        node: N,
    },
}

impl<T: Copy, P, N: Copy> Clone for Child<'_, T, P, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Copy, P, N: Copy> Copy for Child<'_, T, P, N> {}

impl<'a, T: Copy, P, N> Child<'a, T, P, N> {
    /// Bounds of the item or node.
    pub fn bbox(&self) -> Aabb2D<T> {
        match self {
            Self::Item { bbox, .. } | Self::Node { bbox, .. } => *bbox,
        }
    }

    /// Whether this is a leaf item.
    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item { .. })
    }

    /// Rewrap the node handle, leaving items untouched.
    pub fn map_node<M>(self, f: impl FnOnce(N) -> M) -> Child<'a, T, P, M> {
        match self {
            Self::Item { bbox, data } => Child::Item { bbox, data },
            Self::Node { bbox, node } => Child::Node {
                bbox,
                node: f(node),
            },
        }
    }
}

/// Handle to an internal node of one of the bundled backends.
///
/// Only valid for the tree that issued it, and only until that tree is next
/// modified.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    tree: u32,
    epoch: u32,
    idx: u32,
}

/// Per-tree identity and mutation counter used to issue and validate [`NodeId`]s.
#[derive(Debug)]
pub(crate) struct Stamp {
    tree: u32,
    epoch: u32,
}

static NEXT_TREE: AtomicU32 = AtomicU32::new(1);

impl Stamp {
    pub(crate) fn new() -> Self {
        Self {
            tree: NEXT_TREE.fetch_add(1, Ordering::Relaxed),
            epoch: 0,
        }
    }

    /// Invalidate every handle issued so far.
    pub(crate) fn bump(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Arena indices are 32-bit in handles, like index keys."
    )]
    pub(crate) fn issue(&self, idx: usize) -> NodeId {
        NodeId {
            tree: self.tree,
            epoch: self.epoch,
            idx: idx as u32,
        }
    }

    /// Arena index named by `id`, if this tree issued it in the current epoch.
    pub(crate) fn check(&self, id: NodeId) -> Result<usize, TraversalError> {
        if id.tree != self.tree {
            return Err(TraversalError::ForeignNode);
        }
        if id.epoch != self.epoch {
            return Err(TraversalError::StaleNode);
        }
        Ok(id.idx as usize)
    }
}

impl Clone for Stamp {
    // A clone is a different tree; handles must not cross over.
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Counting, bounds, and hierarchical enumeration shared by both index roles.
pub trait Hierarchy<T: Scalar, P> {
    /// Opaque internal-node handle.
    type Node: Copy + Debug + PartialEq;

    /// Number of stored items.
    fn len(&self) -> usize;

    /// Whether no items are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Minimum box containing every stored item, or `None` when empty.
    fn bounds(&self) -> Option<Aabb2D<T>>;

    /// Remove every item. Invalidates outstanding node handles.
    fn clear(&mut self);

    /// Visit the immediate children of `parent`, or the top level when `parent` is `None`.
    fn for_each_child<'a, F>(
        &'a self,
        parent: Option<Self::Node>,
        visit: F,
    ) -> Result<(), TraversalError>
    where
        F: FnMut(Child<'a, T, P, Self::Node>),
        P: 'a;

    /// Collect the immediate children of `parent` into `reuse`.
    ///
    /// `reuse` is cleared first; pass back a previous result to avoid reallocating.
    fn children<'a>(
        &'a self,
        parent: Option<Self::Node>,
        mut reuse: Vec<Child<'a, T, P, Self::Node>>,
    ) -> Result<Vec<Child<'a, T, P, Self::Node>>, TraversalError> {
        reuse.clear();
        self.for_each_child(parent, |c| reuse.push(c))?;
        Ok(reuse)
    }
}

/// An index of points restricted to a domain.
pub trait PointIndex<T: Scalar, P: PartialEq>: Hierarchy<T, P> {
    /// The accepted domain, or `None` if every point is accepted.
    fn domain(&self) -> Option<Aabb2D<T>>;

    /// Whether `(x, y)` may be inserted.
    fn in_bounds(&self, x: T, y: T) -> bool {
        self.domain().is_none_or(|d| d.contains_point(x, y))
    }

    /// Add a point. Points outside the domain are not stored.
    fn insert(&mut self, x: T, y: T, data: P);

    /// Remove one point equal to `(x, y, data)`. Returns whether one was found.
    fn delete(&mut self, x: T, y: T, data: &P) -> bool;

    /// Visit points inside `rect` until the visitor breaks.
    fn search<F>(&self, rect: Aabb2D<T>, visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>;

    /// Visit every point until the visitor breaks.
    fn scan<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>;
}

/// An index of axis-aligned boxes.
pub trait RectIndex<T: Scalar, P: PartialEq>: Hierarchy<T, P> {
    /// Add a box.
    fn insert(&mut self, bbox: Aabb2D<T>, data: P);

    /// Remove one item equal to `(bbox, data)`. Returns whether one was found.
    fn delete(&mut self, bbox: Aabb2D<T>, data: &P) -> bool;

    /// Visit items intersecting `rect` until the visitor breaks.
    fn search<F>(&self, rect: Aabb2D<T>, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>;

    /// Visit every item until the visitor breaks.
    fn scan<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_reject_foreign_and_stale_ids() {
        let mut a = Stamp::new();
        let b = Stamp::new();
        let id = a.issue(3);
        assert_eq!(a.check(id), Ok(3));
        assert_eq!(b.check(id), Err(TraversalError::ForeignNode));
        a.bump();
        assert_eq!(a.check(id), Err(TraversalError::StaleNode));
        assert_eq!(a.clone().check(a.issue(0)), Err(TraversalError::ForeignNode));
    }

    #[test]
    fn map_node_keeps_items() {
        let data = 7_u8;
        let item: Child<'_, i64, u8, u32> = Child::Item {
            bbox: Aabb2D::from_point(1, 2),
            data: &data,
        };
        let mapped = item.map_node(|n| n + 1);
        assert!(mapped.is_item());
        let node: Child<'_, i64, u8, u32> = Child::Node {
            bbox: Aabb2D::new(0, 0, 1, 1),
            node: 41,
        };
        match node.map_node(|n| n + 1) {
            Child::Node { node, .. } => assert_eq!(node, 42),
            Child::Item { .. } => panic!("node became an item"),
        }
    }
}
