// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend with linear scans. Small and simple; good for tiny sets.
//!
//! Implements both [`PointIndex`] and [`RectIndex`]. As a point index it accepts
//! only points inside its domain, if it was given one. The hierarchy is a single
//! level: every item is a child of the root and there are no internal nodes.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::ControlFlow;

use crate::backend::{Child, Hierarchy, NodeId, PointIndex, RectIndex, Stamp};
use crate::error::TraversalError;
use crate::types::{Aabb2D, Scalar, union_aabb};

/// Flat vector backend with linear scans.
#[derive(Clone)]
pub struct FlatVec<T: Scalar, P> {
    domain: Option<Aabb2D<T>>,
    entries: Vec<(Aabb2D<T>, P)>,
    stamp: Stamp,
}

impl<T: Scalar, P> Default for FlatVec<T, P> {
    fn default() -> Self {
        Self {
            domain: None,
            entries: Vec::new(),
            stamp: Stamp::new(),
        }
    }
}

impl<T: Scalar, P> FlatVec<T, P> {
    /// An empty backend that accepts any point.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty backend whose point side only accepts points in `domain`.
    pub fn with_domain(domain: Aabb2D<T>) -> Self {
        Self {
            domain: Some(domain),
            ..Self::default()
        }
    }

    /// A handle that passes this backend's stamp check but names no node.
    #[cfg(test)]
    pub(crate) fn bogus_handle(&self) -> NodeId {
        self.stamp.issue(0)
    }

    fn walk<F>(&self, rect: Option<&Aabb2D<T>>, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        for (bbox, data) in &self.entries {
            if rect.is_none_or(|r| bbox.intersects(r)) && visit(*bbox, data).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn remove_matching(&mut self, bbox: &Aabb2D<T>, data: &P) -> bool
    where
        P: PartialEq,
    {
        let Some(pos) = self
            .entries
            .iter()
            .position(|(b, d)| b == bbox && d == data)
        else {
            return false;
        };
        self.entries.remove(pos);
        self.stamp.bump();
        true
    }
}

impl<T: Scalar, P> Debug for FlatVec<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatVec")
            .field("domain", &self.domain)
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<T: Scalar, P> Hierarchy<T, P> for FlatVec<T, P> {
    type Node = NodeId;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn bounds(&self) -> Option<Aabb2D<T>> {
        self.entries.iter().map(|(b, _)| *b).reduce(union_aabb)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.stamp.bump();
    }

    fn for_each_child<'a, F>(
        &'a self,
        parent: Option<NodeId>,
        mut visit: F,
    ) -> Result<(), TraversalError>
    where
        F: FnMut(Child<'a, T, P, NodeId>),
        P: 'a,
    {
        if let Some(id) = parent {
            // No handle is ever issued, so any handle that passes the stamp is still bogus.
            self.stamp.check(id)?;
            return Err(TraversalError::UnknownNode);
        }
        for (bbox, data) in &self.entries {
            visit(Child::Item { bbox: *bbox, data });
        }
        Ok(())
    }
}

impl<T: Scalar, P: PartialEq> PointIndex<T, P> for FlatVec<T, P> {
    fn domain(&self) -> Option<Aabb2D<T>> {
        self.domain
    }

    fn insert(&mut self, x: T, y: T, data: P) {
        if !self.in_bounds(x, y) {
            log::warn!("flatvec rejected point ({x:?}, {y:?}) outside its domain");
            return;
        }
        self.entries.push((Aabb2D::from_point(x, y), data));
        self.stamp.bump();
    }

    fn delete(&mut self, x: T, y: T, data: &P) -> bool {
        self.remove_matching(&Aabb2D::from_point(x, y), data)
    }

    fn search<F>(&self, rect: Aabb2D<T>, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>,
    {
        self.walk(Some(&rect), |b, d| visit(b.min_x, b.min_y, d))
    }

    fn scan<F>(&self, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>,
    {
        self.walk(None, |b, d| visit(b.min_x, b.min_y, d))
    }
}

impl<T: Scalar, P: PartialEq> RectIndex<T, P> for FlatVec<T, P> {
    fn insert(&mut self, bbox: Aabb2D<T>, data: P) {
        self.entries.push((bbox, data));
        self.stamp.bump();
    }

    fn delete(&mut self, bbox: Aabb2D<T>, data: &P) -> bool {
        self.remove_matching(&bbox, data)
    }

    fn search<F>(&self, rect: Aabb2D<T>, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        self.walk(Some(&rect), visit)
    }

    fn scan<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        self.walk(None, visit)
    }
}
