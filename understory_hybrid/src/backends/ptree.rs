// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point quadtree backend over a fixed domain.
//!
//! Each node covers a cell of the domain. Leaves hold up to `bucket_capacity`
//! points and split into four equal quadrants when they overflow; branches whose
//! quadrants drain back under capacity merge into a single leaf again. Every node
//! also tracks the tight extent of the points below it, which is what `bounds`,
//! searches, and child enumeration report.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::ControlFlow;

use crate::backend::{Child, Hierarchy, NodeId, PointIndex, Stamp};
use crate::config::PTreeConfig;
use crate::error::{ConfigError, TraversalError};
use crate::types::{Aabb2D, Scalar, grow, lt, union_aabb};

/// Bucketed point quadtree.
#[derive(Clone)]
pub struct PTree<T: Scalar, P> {
    domain: Aabb2D<T>,
    config: PTreeConfig,
    arena: Vec<QNode<T, P>>,
    free: Vec<NodeIdx>,
    len: usize,
    stamp: Stamp,
}

#[derive(Clone)]
struct QNode<T, P> {
    cell: Aabb2D<T>,
    extent: Option<Aabb2D<T>>,
    depth: usize,
    kind: Kind<T, P>,
}

#[derive(Clone)]
enum Kind<T, P> {
    Leaf(Vec<(T, T, P)>),
    Branch([NodeIdx; 4]),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn get(self) -> usize {
        self.0
    }
}

/// The root always occupies the first arena slot.
const ROOT: NodeIdx = NodeIdx(0);

/// Quadrant of `cell` holding `(x, y)`: bit 0 set for the upper x half, bit 1 for the upper y half.
///
/// Points on a midline belong to the upper half, whose closed cell includes the midline.
fn quadrant<T: Scalar>(cell: &Aabb2D<T>, x: T, y: T) -> usize {
    let mx = T::mid(cell.min_x, cell.max_x);
    let my = T::mid(cell.min_y, cell.max_y);
    usize::from(!lt(x, mx)) | (usize::from(!lt(y, my)) << 1)
}

fn sub_cell<T: Scalar>(cell: &Aabb2D<T>, q: usize) -> Aabb2D<T> {
    let mx = T::mid(cell.min_x, cell.max_x);
    let my = T::mid(cell.min_y, cell.max_y);
    let (min_x, max_x) = if q & 1 == 0 {
        (cell.min_x, mx)
    } else {
        (mx, cell.max_x)
    };
    let (min_y, max_y) = if q & 2 == 0 {
        (cell.min_y, my)
    } else {
        (my, cell.max_y)
    };
    Aabb2D::new(min_x, min_y, max_x, max_y)
}

fn points_extent<T: Scalar, P>(items: &[(T, T, P)]) -> Option<Aabb2D<T>> {
    items
        .iter()
        .map(|(x, y, _)| Aabb2D::from_point(*x, *y))
        .reduce(union_aabb)
}

impl<T: Scalar, P> PTree<T, P> {
    /// Create an empty tree over `domain` with default bucket sizing.
    ///
    /// `domain` must not be inverted; an inverted domain accepts no points.
    /// Use [`PTree::with_config`] to have that reported as an error instead.
    pub fn new(domain: Aabb2D<T>) -> Self {
        debug_assert!(!domain.is_empty(), "point domain must not be inverted");
        Self {
            domain,
            config: PTreeConfig::default(),
            arena: vec![QNode {
                cell: domain,
                extent: None,
                depth: 0,
                kind: Kind::Leaf(Vec::new()),
            }],
            free: Vec::new(),
            len: 0,
            stamp: Stamp::new(),
        }
    }

    /// Create an empty tree over `domain` with custom bucket sizing.
    pub fn with_config(domain: Aabb2D<T>, config: PTreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if domain.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        Ok(Self {
            config,
            ..Self::new(domain)
        })
    }

    /// The bucket sizing this tree was built with.
    pub fn config(&self) -> PTreeConfig {
        self.config
    }

    /// Deepest leaf level, counting the root as 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![ROOT];
        while let Some(i) = stack.pop() {
            let node = &self.arena[i.get()];
            match &node.kind {
                Kind::Leaf(_) => deepest = deepest.max(node.depth + 1),
                Kind::Branch(kids) => stack.extend_from_slice(kids),
            }
        }
        deepest
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.arena.len() - self.free.len()
    }

    fn alloc(&mut self, node: QNode<T, P>) -> NodeIdx {
        if let Some(idx) = self.free.pop() {
            self.arena[idx.get()] = node;
            idx
        } else {
            self.arena.push(node);
            NodeIdx(self.arena.len() - 1)
        }
    }

    fn release(&mut self, idx: NodeIdx) {
        let node = &mut self.arena[idx.get()];
        node.kind = Kind::Leaf(Vec::new());
        node.extent = None;
        self.free.push(idx);
    }

    fn refresh(&mut self, at: NodeIdx) {
        let extent = match &self.arena[at.get()].kind {
            Kind::Leaf(items) => points_extent(items),
            Kind::Branch(kids) => kids
                .iter()
                .filter_map(|k| self.arena[k.get()].extent)
                .reduce(union_aabb),
        };
        self.arena[at.get()].extent = extent;
    }

    fn overflowing(&self, at: NodeIdx) -> bool {
        let node = &self.arena[at.get()];
        match &node.kind {
            Kind::Leaf(items) => {
                items.len() > self.config.bucket_capacity && node.depth < self.config.max_depth
            }
            Kind::Branch(_) => false,
        }
    }

    /// Turn an overflowing leaf into a branch of four quadrant leaves, repeating
    /// for any quadrant that still overflows.
    fn subdivide(&mut self, at: NodeIdx) {
        let mut pending = vec![at];
        while let Some(at) = pending.pop() {
            let (cell, depth) = {
                let node = &self.arena[at.get()];
                (node.cell, node.depth)
            };
            let items = match &mut self.arena[at.get()].kind {
                Kind::Leaf(items) => core::mem::take(items),
                Kind::Branch(_) => continue,
            };
            let mut buckets: [Vec<(T, T, P)>; 4] = core::array::from_fn(|_| Vec::new());
            for (x, y, data) in items {
                buckets[quadrant(&cell, x, y)].push((x, y, data));
            }
            let mut kids = [ROOT; 4];
            for (q, bucket) in buckets.into_iter().enumerate() {
                kids[q] = self.alloc(QNode {
                    cell: sub_cell(&cell, q),
                    extent: points_extent(&bucket),
                    depth: depth + 1,
                    kind: Kind::Leaf(bucket),
                });
            }
            self.arena[at.get()].kind = Kind::Branch(kids);
            log::debug!("ptree subdivided a leaf at depth {depth}");
            pending.extend(kids.into_iter().filter(|&kid| self.overflowing(kid)));
        }
    }

    /// Fold a branch back into a leaf if its quadrants are leaves that fit one bucket.
    fn try_merge(&mut self, at: NodeIdx) {
        let kids = match &self.arena[at.get()].kind {
            Kind::Branch(kids) => *kids,
            Kind::Leaf(_) => return,
        };
        let mut total = 0;
        for kid in kids {
            match &self.arena[kid.get()].kind {
                Kind::Leaf(items) => total += items.len(),
                Kind::Branch(_) => return,
            }
        }
        if total > self.config.bucket_capacity {
            return;
        }
        let mut merged = Vec::with_capacity(total);
        for kid in kids {
            if let Kind::Leaf(items) = &mut self.arena[kid.get()].kind {
                merged.append(items);
            }
            self.release(kid);
        }
        self.arena[at.get()].kind = Kind::Leaf(merged);
        log::debug!(
            "ptree merged a branch at depth {}",
            self.arena[at.get()].depth
        );
    }

    fn visit_points<F>(&self, rect: Option<&Aabb2D<T>>, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>,
    {
        let mut stack = vec![ROOT];
        while let Some(i) = stack.pop() {
            let node = &self.arena[i.get()];
            let Some(extent) = node.extent else {
                continue;
            };
            if rect.is_some_and(|r| !extent.intersects(r)) {
                continue;
            }
            match &node.kind {
                Kind::Leaf(items) => {
                    for (x, y, data) in items {
                        if rect.is_none_or(|r| r.contains_point(*x, *y))
                            && visit(*x, *y, data).is_break()
                        {
                            return ControlFlow::Break(());
                        }
                    }
                }
                Kind::Branch(kids) => stack.extend(kids.iter().rev().copied()),
            }
        }
        ControlFlow::Continue(())
    }
}

impl<T: Scalar, P> Hierarchy<T, P> for PTree<T, P> {
    type Node = NodeId;

    fn len(&self) -> usize {
        self.len
    }

    fn bounds(&self) -> Option<Aabb2D<T>> {
        self.arena[ROOT.get()].extent
    }

    fn clear(&mut self) {
        self.arena.truncate(1);
        self.arena[ROOT.get()].kind = Kind::Leaf(Vec::new());
        self.arena[ROOT.get()].extent = None;
        self.free.clear();
        self.len = 0;
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
        let at = match parent {
            None => ROOT,
            Some(id) => {
                let idx = self.stamp.check(id)?;
                if idx >= self.arena.len() {
                    return Err(TraversalError::UnknownNode);
                }
                NodeIdx(idx)
            }
        };
        match &self.arena[at.get()].kind {
            Kind::Leaf(items) => {
                for (x, y, data) in items {
                    visit(Child::Item {
                        bbox: Aabb2D::from_point(*x, *y),
                        data,
                    });
                }
            }
            Kind::Branch(kids) => {
                for kid in kids {
                    if let Some(bbox) = self.arena[kid.get()].extent {
                        visit(Child::Node {
                            bbox,
                            node: self.stamp.issue(kid.get()),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl<T: Scalar, P: PartialEq> PointIndex<T, P> for PTree<T, P> {
    fn domain(&self) -> Option<Aabb2D<T>> {
        Some(self.domain)
    }

    fn in_bounds(&self, x: T, y: T) -> bool {
        self.domain.contains_point(x, y)
    }

    fn insert(&mut self, x: T, y: T, data: P) {
        if !self.in_bounds(x, y) {
            log::warn!("ptree rejected point ({x:?}, {y:?}) outside its domain");
            return;
        }
        self.stamp.bump();
        self.len += 1;
        let point = Aabb2D::from_point(x, y);
        let mut at = ROOT;
        loop {
            let node = &mut self.arena[at.get()];
            node.extent = Some(grow(node.extent, point));
            let q = quadrant(&node.cell, x, y);
            match &mut node.kind {
                Kind::Branch(kids) => at = kids[q],
                Kind::Leaf(items) => {
                    items.push((x, y, data));
                    if self.overflowing(at) {
                        self.subdivide(at);
                    }
                    return;
                }
            }
        }
    }

    fn delete(&mut self, x: T, y: T, data: &P) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let mut path = Vec::new();
        let mut at = ROOT;
        while let Kind::Branch(kids) = &self.arena[at.get()].kind {
            path.push(at);
            at = kids[quadrant(&self.arena[at.get()].cell, x, y)];
        }
        let Kind::Leaf(items) = &mut self.arena[at.get()].kind else {
            return false;
        };
        let Some(pos) = items
            .iter()
            .position(|(ix, iy, d)| *ix == x && *iy == y && d == data)
        else {
            return false;
        };
        items.remove(pos);
        self.len -= 1;
        self.stamp.bump();
        self.refresh(at);
        for &up in path.iter().rev() {
            self.refresh(up);
            self.try_merge(up);
        }
        true
    }

    fn search<F>(&self, rect: Aabb2D<T>, visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>,
    {
        self.visit_points(Some(&rect), visit)
    }

    fn scan<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(T, T, &P) -> ControlFlow<()>,
    {
        self.visit_points(None, visit)
    }
}

impl<T: Scalar, P> Debug for PTree<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PTree")
            .field("domain", &self.domain)
            .field("bucket_capacity", &self.config.bucket_capacity)
            .field("len", &self.len)
            .field("arena_nodes", &self.arena.len())
            .field("free_nodes", &self.free.len())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// Point quadtree with f64 coordinates.
pub type PTreeF64<P> = PTree<f64, P>;

/// Point quadtree with f32 coordinates.
pub type PTreeF32<P> = PTree<f32, P>;

/// Point quadtree with i64 coordinates.
pub type PTreeI64<P> = PTree<i64, P>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn world() -> PTree<f64, u32> {
        PTree::new(Aabb2D::new(-180.0, -90.0, 180.0, 90.0))
    }

    fn small() -> PTree<f64, u32> {
        let config = PTreeConfig {
            bucket_capacity: 4,
            max_depth: 8,
        };
        PTree::with_config(Aabb2D::new(-180.0, -90.0, 180.0, 90.0), config).unwrap()
    }

    fn collect(tree: &PTree<f64, u32>, rect: Aabb2D<f64>) -> Vec<u32> {
        let mut out = Vec::new();
        let _ = tree.search(rect, |_, _, d| {
            out.push(*d);
            ControlFlow::Continue(())
        });
        out.sort_unstable();
        out
    }

    #[test]
    fn rejects_points_outside_domain() {
        let mut tree = world();
        tree.insert(200.0, 0.0, 1);
        tree.insert(0.0, -90.5, 2);
        assert!(tree.is_empty());
        assert!(!tree.in_bounds(200.0, 0.0));
        tree.insert(180.0, 90.0, 3);
        tree.insert(-180.0, -90.0, 4);
        assert_eq!(tree.len(), 2, "domain corners are inside");
        assert_eq!(collect(&tree, Aabb2D::new(179.0, 89.0, 180.0, 90.0)), vec![3]);
    }

    #[test]
    fn subdivides_and_finds_points() {
        let mut tree = small();
        let mut id = 0;
        for ix in -10..10 {
            for iy in -5..5 {
                tree.insert(f64::from(ix) * 15.0, f64::from(iy) * 15.0, id);
                id += 1;
            }
        }
        assert_eq!(tree.len(), 200);
        assert!(tree.depth() > 2, "200 points over 4-point buckets must subdivide");
        let hits = collect(&tree, Aabb2D::new(-1.0, -1.0, 1.0, 1.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(
            tree.bounds(),
            Some(Aabb2D::new(-150.0, -75.0, 135.0, 60.0)),
            "bounds are the points' extent, not the domain"
        );
    }

    #[test]
    fn deletes_merge_buckets_back() {
        let mut tree = small();
        let pts: Vec<(f64, f64, u32)> = (0..40_u32)
            .map(|i| (f64::from(i) * 4.0 - 80.0, f64::from(i % 7) * 10.0 - 30.0, i))
            .collect();
        for &(x, y, d) in &pts {
            tree.insert(x, y, d);
        }
        assert!(tree.node_count() > 1);
        for &(x, y, d) in &pts[..38] {
            assert!(tree.delete(x, y, &d), "point {d} must be found");
        }
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node_count(), 1, "two points fit in the root bucket");
        assert_eq!(tree.depth(), 1);
        let (x, y, _) = pts[39];
        assert_eq!(tree.bounds(), Some(Aabb2D::new(pts[38].0, pts[38].1, x, y)));
    }

    #[test]
    fn delete_requires_exact_match() {
        let mut tree = world();
        tree.insert(1.0, 1.0, 7);
        assert!(!tree.delete(1.0, 1.0, &8));
        assert!(!tree.delete(1.0, 1.5, &7));
        assert!(!tree.delete(500.0, 1.0, &7));
        assert!(tree.delete(1.0, 1.0, &7));
        assert!(!tree.delete(1.0, 1.0, &7), "second delete is a miss");
        assert_eq!(tree.bounds(), None);
    }

    #[test]
    fn coincident_points_stop_at_max_depth() {
        let mut tree = small();
        for i in 0..50 {
            tree.insert(3.0, 3.0, i);
        }
        assert_eq!(tree.len(), 50);
        assert!(tree.depth() <= 9, "max_depth bounds subdivision");
        assert_eq!(collect(&tree, Aabb2D::from_point(3.0, 3.0)).len(), 50);
    }

    #[test]
    fn deepest_allowed_config_subdivides_without_recursing() {
        let config = PTreeConfig {
            bucket_capacity: 1,
            max_depth: PTreeConfig::MAX_DEPTH,
        };
        let mut tree = PTree::with_config(Aabb2D::new(0.0, 0.0, 8.0, 8.0), config).unwrap();
        tree.insert(3.0, 3.0, 1);
        tree.insert(3.0, 3.0, 2);
        assert_eq!(tree.depth(), PTreeConfig::MAX_DEPTH + 1);
        assert_eq!(collect(&tree, Aabb2D::from_point(3.0, 3.0)), vec![1, 2]);
        assert!(tree.delete(3.0, 3.0, &1));
        assert_eq!(tree.node_count(), 1, "one point folds every level back");
        let deep = PTreeConfig {
            max_depth: 1_000_000,
            ..config
        };
        assert_eq!(
            PTree::<f64, u32>::with_config(Aabb2D::new(0.0, 0.0, 8.0, 8.0), deep).unwrap_err(),
            ConfigError::MaxDepthTooLarge(1_000_000)
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "point domain must not be inverted")]
    fn inverted_domain_is_caught_by_new() {
        let _ = PTree::<i64, u8>::new(Aabb2D::new(5, 0, 1, 1));
    }

    #[test]
    fn children_walk_reaches_every_point() {
        let mut tree = small();
        for i in 0..100_u32 {
            tree.insert(f64::from(i) - 50.0, f64::from(i % 13) - 6.0, i);
        }
        let mut seen = Vec::new();
        let mut stack = vec![None];
        let mut buf = Vec::new();
        while let Some(parent) = stack.pop() {
            buf = tree.children(parent, buf).unwrap();
            for c in &buf {
                match c {
                    Child::Item { bbox, data } => {
                        assert!(bbox.is_point());
                        seen.push(**data);
                    }
                    Child::Node { node, .. } => stack.push(Some(*node)),
                }
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn scan_stops_early() {
        let mut tree = world();
        for i in 0..10 {
            tree.insert(f64::from(i), 0.0, i);
        }
        let mut seen = 0;
        assert!(
            tree.scan(|_, _, _| {
                seen += 1;
                ControlFlow::Break(())
            })
            .is_break()
        );
        assert_eq!(seen, 1);
    }

    #[test]
    fn integer_domains_work() {
        let config = PTreeConfig {
            bucket_capacity: 1,
            max_depth: 6,
        };
        let mut tree: PTree<i64, u8> = PTree::with_config(Aabb2D::new(0, 0, 7, 7), config).unwrap();
        for x in 0..8 {
            tree.insert(x, x, u8::try_from(x).unwrap());
        }
        assert_eq!(tree.len(), 8);
        let mut hits = Vec::new();
        let _ = tree.search(Aabb2D::new(2, 2, 4, 4), |x, _, _| {
            hits.push(x);
            ControlFlow::Continue(())
        });
        hits.sort_unstable();
        assert_eq!(hits, vec![2, 3, 4]);
        assert_eq!(
            PTree::<i64, u8>::with_config(Aabb2D::new(5, 0, 1, 1), PTreeConfig::default())
                .unwrap_err(),
            ConfigError::EmptyDomain
        );
    }
}
