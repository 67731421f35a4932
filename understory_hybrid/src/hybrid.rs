// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The hybrid index: one point index and one rectangle index behind a single API.
//!
//! Every item is routed by [`HybridIndex::classify`]: degenerate boxes inside the
//! point domain go to the point side, everything else to the rectangle side.
//! Queries visit the point side first and stop as soon as the visitor breaks,
//! without touching the rectangle side.
//!
//! Traversal goes through [`Hierarchy`]. Internal nodes from either side come back
//! wrapped in a [`HybridNode`] that records which side issued them, so a handle
//! is always passed back to the tree it came from.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::ops::ControlFlow;

use crate::backend::{Child, Hierarchy, PointIndex, RectIndex};
use crate::backends::{PTree, RTree};
use crate::config::HybridConfig;
use crate::error::{ConfigError, TraversalError};
use crate::types::{Aabb2D, Scalar};

/// Which half of a [`HybridIndex`] owns an item.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// A degenerate box inside the point domain.
    Point,
    /// Anything else.
    Rect,
}

/// Internal-node handle of a [`HybridIndex`], tagged with the side that issued it.
///
/// The root of the combined hierarchy is `None`; it has no handle of its own.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HybridNode<PN, RN> {
    /// A node of the point index.
    Point(PN),
    /// A node of the rectangle index.
    Rect(RN),
}

/// Size and shape of a [`HybridIndex`] over the bundled backends.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HybridStats {
    /// Items stored on the point side.
    pub points: usize,
    /// Items stored on the rectangle side.
    pub rects: usize,
    /// Live quadtree nodes.
    pub point_nodes: usize,
    /// Live R-tree nodes.
    pub rect_nodes: usize,
    /// Quadtree depth, counting the root.
    pub point_depth: usize,
    /// R-tree depth (0 when empty).
    pub rect_depth: usize,
}

/// A spatial index that routes points and rectangles to separate backends.
///
/// The defaults are a [`PTree`] for points and an [`RTree`] for rectangles; any
/// [`PointIndex`] / [`RectIndex`] pair can be combined with [`HybridIndex::from_parts`].
pub struct HybridIndex<T: Scalar, P, PI = PTree<T, P>, RI = RTree<T, P>> {
    points: PI,
    rects: RI,
    _marker: PhantomData<fn() -> (T, P)>,
}

impl<T: Scalar, P, PI, RI> HybridIndex<T, P, PI, RI> {
    /// Combine two backends into one index. Both are owned from here on.
    pub fn from_parts(points: PI, rects: RI) -> Self {
        Self {
            points,
            rects,
            _marker: PhantomData,
        }
    }
}

impl<T: Scalar, P: PartialEq> HybridIndex<T, P> {
    /// Create an empty index whose point side covers `domain`.
    ///
    /// `domain` must not be inverted (checked in debug builds). An inverted
    /// domain would route every item to the rectangle side; [`Self::with_config`]
    /// rejects it with [`ConfigError::EmptyDomain`].
    pub fn new(domain: Aabb2D<T>) -> Self {
        Self::from_parts(PTree::new(domain), RTree::new())
    }

    /// Create an empty index with custom backend tuning.
    pub fn with_config(domain: Aabb2D<T>, config: HybridConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(
            PTree::with_config(domain, config.point)?,
            RTree::with_config(config.rect)?,
        ))
    }

    /// Build an index from a batch of items.
    ///
    /// Points are inserted one by one; rectangles are packed with
    /// [`RTree::bulk_load`], which gives tighter nodes than repeated inserts.
    pub fn bulk_load(
        domain: Aabb2D<T>,
        config: HybridConfig,
        items: Vec<(Aabb2D<T>, P)>,
    ) -> Result<Self, ConfigError> {
        let mut index = Self::with_config(domain, config)?;
        let mut rects = Vec::new();
        for (bbox, data) in items {
            match index.classify(&bbox) {
                Route::Point => index.points.insert(bbox.min_x, bbox.min_y, data),
                Route::Rect => rects.push((bbox, data)),
            }
        }
        index.rects = RTree::bulk_load(config.rect, rects)?;
        log::debug!(
            "hybrid bulk load: {} points, {} rects",
            index.points.len(),
            index.rects.len()
        );
        Ok(index)
    }

    /// Item counts and tree shapes of both sides.
    pub fn stats(&self) -> HybridStats {
        HybridStats {
            points: self.points.len(),
            rects: self.rects.len(),
            point_nodes: self.points.node_count(),
            rect_nodes: self.rects.node_count(),
            point_depth: self.points.depth(),
            rect_depth: self.rects.depth(),
        }
    }
}

impl<T, P, PI, RI> HybridIndex<T, P, PI, RI>
where
    T: Scalar,
    P: PartialEq,
    PI: PointIndex<T, P>,
    RI: RectIndex<T, P>,
{
    /// The point domain, or `None` if the point side accepts any location.
    pub fn domain(&self) -> Option<Aabb2D<T>> {
        self.points.domain()
    }

    /// Which side an item with this box belongs to.
    pub fn classify(&self, bbox: &Aabb2D<T>) -> Route {
        if bbox.is_point() && self.points.in_bounds(bbox.min_x, bbox.min_y) {
            Route::Point
        } else {
            Route::Rect
        }
    }

    /// Add an item.
    pub fn insert(&mut self, bbox: Aabb2D<T>, data: P) {
        let route = self.classify(&bbox);
        log::trace!("hybrid insert {bbox:?} -> {route:?}");
        match route {
            Route::Point => self.points.insert(bbox.min_x, bbox.min_y, data),
            Route::Rect => self.rects.insert(bbox, data),
        }
    }

    /// Remove one item equal to `(bbox, data)`. Returns whether one was found.
    ///
    /// Only the side `bbox` routes to is searched.
    pub fn delete(&mut self, bbox: Aabb2D<T>, data: &P) -> bool {
        let route = self.classify(&bbox);
        log::trace!("hybrid delete {bbox:?} -> {route:?}");
        match route {
            Route::Point => self.points.delete(bbox.min_x, bbox.min_y, data),
            Route::Rect => self.rects.delete(bbox, data),
        }
    }

    /// Delete the old item, then insert the new one.
    ///
    /// The two steps route independently, so an item can move between sides.
    /// The new item is inserted even if the old one was not found; the return
    /// value reports whether it was.
    pub fn replace(
        &mut self,
        old_bbox: Aabb2D<T>,
        old_data: &P,
        new_bbox: Aabb2D<T>,
        new_data: P,
    ) -> bool {
        let found = self.delete(old_bbox, old_data);
        self.insert(new_bbox, new_data);
        found
    }

    /// Visit items intersecting `rect`, points first, until the visitor breaks.
    ///
    /// Points are reported as degenerate boxes. Once the visitor breaks nothing
    /// else is visited, including the rectangle side.
    pub fn search<F>(&self, rect: Aabb2D<T>, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        if self
            .points
            .search(rect, |x, y, data| visit(Aabb2D::from_point(x, y), data))
            .is_break()
        {
            return ControlFlow::Break(());
        }
        self.rects.search(rect, visit)
    }

    /// Visit every item, points first, until the visitor breaks.
    pub fn scan<F>(&self, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        if self
            .points
            .scan(|x, y, data| visit(Aabb2D::from_point(x, y), data))
            .is_break()
        {
            return ControlFlow::Break(());
        }
        self.rects.scan(visit)
    }

    /// Number of items on the point side.
    pub fn point_len(&self) -> usize {
        self.points.len()
    }

    /// Number of items on the rectangle side.
    pub fn rect_len(&self) -> usize {
        self.rects.len()
    }
}

impl<T, P, PI, RI> Hierarchy<T, P> for HybridIndex<T, P, PI, RI>
where
    T: Scalar,
    P: PartialEq,
    PI: PointIndex<T, P>,
    RI: RectIndex<T, P>,
{
    type Node = HybridNode<PI::Node, RI::Node>;

    fn len(&self) -> usize {
        self.points.len() + self.rects.len()
    }

    fn bounds(&self) -> Option<Aabb2D<T>> {
        match (self.points.bounds(), self.rects.bounds()) {
            (Some(p), Some(r)) => Some(p.expand(&r)),
            (p, r) => p.or(r),
        }
    }

    fn clear(&mut self) {
        self.points.clear();
        self.rects.clear();
    }

    /// Visit the children of `parent`.
    ///
    /// At the root, the point side's top level comes first, then the rectangle
    /// side's. Below the root, the tag on `parent` picks the side. Node handles
    /// are tagged with their side; items pass through as they are.
    fn for_each_child<'a, F>(
        &'a self,
        parent: Option<Self::Node>,
        mut visit: F,
    ) -> Result<(), TraversalError>
    where
        F: FnMut(Child<'a, T, P, Self::Node>),
        P: 'a,
    {
        let result = match parent {
            None => self
                .points
                .for_each_child(None, |c| visit(c.map_node(HybridNode::Point)))
                .and_then(|()| {
                    self.rects
                        .for_each_child(None, |c| visit(c.map_node(HybridNode::Rect)))
                }),
            Some(HybridNode::Point(node)) => self
                .points
                .for_each_child(Some(node), |c| visit(c.map_node(HybridNode::Point))),
            Some(HybridNode::Rect(node)) => self
                .rects
                .for_each_child(Some(node), |c| visit(c.map_node(HybridNode::Rect))),
        };
        result.inspect_err(|err| log::error!("hybrid traversal from {parent:?} failed: {err}"))
    }
}

impl<T, P, PI, RI> Extend<(Aabb2D<T>, P)> for HybridIndex<T, P, PI, RI>
where
    T: Scalar,
    P: PartialEq,
    PI: PointIndex<T, P>,
    RI: RectIndex<T, P>,
{
    fn extend<I: IntoIterator<Item = (Aabb2D<T>, P)>>(&mut self, iter: I) {
        for (bbox, data) in iter {
            self.insert(bbox, data);
        }
    }
}

impl<T: Scalar, P, PI: Clone, RI: Clone> Clone for HybridIndex<T, P, PI, RI> {
    fn clone(&self) -> Self {
        Self::from_parts(self.points.clone(), self.rects.clone())
    }
}

impl<T: Scalar, P, PI: Debug, RI: Debug> Debug for HybridIndex<T, P, PI, RI> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HybridIndex")
            .field("points", &self.points)
            .field("rects", &self.rects)
            .finish()
    }
}

/// Convenience type aliases.
/// Hybrid index with f64 coordinates.
pub type HybridF64<P> = HybridIndex<f64, P>;

/// Hybrid index with f32 coordinates.
pub type HybridF32<P> = HybridIndex<f32, P>;

/// Hybrid index with i64 coordinates.
pub type HybridI64<P> = HybridIndex<i64, P>;
