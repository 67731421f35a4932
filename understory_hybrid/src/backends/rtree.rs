// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree backend generic over scalar `T: Scalar` with SAH-like split.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;
use core::ops::ControlFlow;

use crate::backend::{Child, Hierarchy, NodeId, RectIndex, Stamp};
use crate::config::RTreeConfig;
use crate::error::{ConfigError, TraversalError};
use crate::types::{Aabb2D, Scalar, area, grow, union_aabb};

/// R-tree backend using SAH-like splits and widened accumulator metrics.
///
/// Stores `(Aabb2D<T>, P)` items. Nodes live in an arena; nodes emptied by
/// deletes are recycled through a free list.
#[derive(Clone)]
pub struct RTree<T: Scalar, P> {
    config: RTreeConfig,
    root: Option<NodeIdx>,
    arena: Vec<RNode<T, P>>,
    free: Vec<NodeIdx>,
    len: usize,
    stamp: Stamp,
}

#[derive(Clone)]
struct RNode<T, P> {
    bbox: Aabb2D<T>,
    entries: Entries<T, P>,
}

#[derive(Clone)]
enum Entries<T, P> {
    Leaf(Vec<(Aabb2D<T>, P)>),
    Branch(Vec<NodeIdx>),
}

impl<T, P> Entries<T, P> {
    fn len(&self) -> usize {
        match self {
            Self::Leaf(items) => items.len(),
            Self::Branch(kids) => kids.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn new(i: usize) -> Self {
        Self(i)
    }

    const fn get(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn centroid<T: Scalar>(self, b: &Aabb2D<T>) -> T {
        match self {
            Self::X => T::mid(b.min_x, b.max_x),
            Self::Y => T::mid(b.min_y, b.max_y),
        }
    }

    fn cmp<T: Scalar>(self, a: &Aabb2D<T>, b: &Aabb2D<T>) -> Ordering {
        self.centroid(a)
            .partial_cmp(&self.centroid(b))
            .unwrap_or(Ordering::Equal)
    }
}

impl<T: Scalar, P> Default for RTree<T, P> {
    fn default() -> Self {
        Self {
            config: RTreeConfig::default(),
            root: None,
            arena: Vec::new(),
            free: Vec::new(),
            len: 0,
            stamp: Stamp::new(),
        }
    }
}

/// Split `entries` in two, minimizing `area(LB_k) * k + area(RB_k) * (n - k)`.
///
/// Both axes are tried by centroid order; prefix/suffix bounding boxes make each
/// candidate `k` O(1). Each half keeps at least `min_children` entries.
fn split_entries<T: Scalar, E>(
    entries: Vec<E>,
    bbox_of: impl Fn(&E) -> Aabb2D<T>,
    min_children: usize,
) -> (Vec<E>, Vec<E>) {
    let mut tagged: Vec<(Aabb2D<T>, E)> = entries.into_iter().map(|e| (bbox_of(&e), e)).collect();
    let n = tagged.len();
    let lo = min_children.max(1);
    let mut best: Option<(T::Acc, Axis, usize)> = None;
    for axis in [Axis::X, Axis::Y] {
        tagged.sort_by(|a, b| axis.cmp(&a.0, &b.0));

        let mut prefix: Vec<Aabb2D<T>> = Vec::with_capacity(n);
        for (bb, _) in &tagged {
            prefix.push(grow(prefix.last().copied(), *bb));
        }
        let mut suffix: Vec<Aabb2D<T>> = Vec::with_capacity(n);
        for (bb, _) in tagged.iter().rev() {
            suffix.push(grow(suffix.last().copied(), *bb));
        }
        suffix.reverse();

        for k in lo..=n.saturating_sub(lo) {
            let cost = area(&prefix[k - 1]) * T::acc_from_usize(k)
                + area(&suffix[k]) * T::acc_from_usize(n - k);
            if best.is_none_or(|(c, _, _)| cost < c) {
                best = Some((cost, axis, k));
            }
        }
    }
    let (axis, k) = best.map_or((Axis::X, n / 2), |(_, axis, k)| (axis, k));
    tagged.sort_by(|a, b| axis.cmp(&a.0, &b.0));
    let right = tagged.split_off(k);
    (
        tagged.into_iter().map(|(_, e)| e).collect(),
        right.into_iter().map(|(_, e)| e).collect(),
    )
}

/// Move `v` into consecutive chunks of at most `size` elements.
fn chunked<E>(v: Vec<E>, size: usize) -> Vec<Vec<E>> {
    let mut out = Vec::new();
    let mut it = v.into_iter();
    loop {
        let chunk: Vec<E> = it.by_ref().take(size).collect();
        if chunk.is_empty() {
            return out;
        }
        out.push(chunk);
    }
}

/// Number of vertical STR slices for `count` groups: ceil(sqrt(count)).
fn str_slices(count: usize) -> usize {
    let mut gx = 1_usize;
    while gx * gx < count {
        gx += 1;
    }
    gx
}

impl<T: Scalar, P> RTree<T, P> {
    /// Create an empty tree with the default fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with a custom fan-out.
    pub fn with_config(config: RTreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// STR bulk load: builds a packed tree from `items` in one pass.
    pub fn bulk_load(
        config: RTreeConfig,
        items: Vec<(Aabb2D<T>, P)>,
    ) -> Result<Self, ConfigError> {
        let mut tree = Self::with_config(config)?;
        if items.is_empty() {
            return Ok(tree);
        }
        let max = config.max_children;
        tree.len = items.len();

        let mut items = items;
        items.sort_by(|a, b| Axis::X.cmp(&a.0, &b.0));
        let slice_size = items.len().div_ceil(str_slices(items.len().div_ceil(max)));
        let mut level: Vec<NodeIdx> = Vec::new();
        for mut slice in chunked(items, slice_size) {
            slice.sort_by(|a, b| Axis::Y.cmp(&a.0, &b.0));
            for leaf in chunked(slice, max) {
                let entries = Entries::Leaf(leaf);
                if let Some(bbox) = Self::entries_bbox(&tree.arena, &entries) {
                    level.push(tree.alloc(RNode { bbox, entries }));
                }
            }
        }

        // Promote until a single level fits under one root.
        while level.len() > max {
            let arena = &tree.arena;
            level.sort_by(|&a, &b| Axis::X.cmp(&arena[a.get()].bbox, &arena[b.get()].bbox));
            let slice_size = level.len().div_ceil(str_slices(level.len().div_ceil(max)));
            let mut next = Vec::new();
            for mut slice in chunked(level, slice_size) {
                let arena = &tree.arena;
                slice.sort_by(|&a, &b| Axis::Y.cmp(&arena[a.get()].bbox, &arena[b.get()].bbox));
                for group in chunked(slice, max) {
                    let entries = Entries::Branch(group);
                    if let Some(bbox) = Self::entries_bbox(&tree.arena, &entries) {
                        next.push(tree.alloc(RNode { bbox, entries }));
                    }
                }
            }
            level = next;
        }

        tree.root = match level.len() {
            0 => None,
            1 => Some(level[0]),
            _ => {
                let entries = Entries::Branch(level);
                Self::entries_bbox(&tree.arena, &entries)
                    .map(|bbox| tree.alloc(RNode { bbox, entries }))
            }
        };
        log::debug!(
            "rtree bulk load: {} items, {} nodes, depth {}",
            tree.len,
            tree.node_count(),
            tree.depth()
        );
        Ok(tree)
    }

    /// The fan-out this tree was built with.
    pub fn config(&self) -> RTreeConfig {
        self.config
    }

    /// Number of levels from the root to the leaves (0 when empty).
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.root;
        while let Some(i) = cur {
            depth += 1;
            cur = match &self.arena[i.get()].entries {
                Entries::Branch(kids) => kids.first().copied(),
                Entries::Leaf(_) => None,
            };
        }
        depth
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.arena.len() - self.free.len()
    }

    fn alloc(&mut self, node: RNode<T, P>) -> NodeIdx {
        if let Some(idx) = self.free.pop() {
            self.arena[idx.get()] = node;
            idx
        } else {
            self.arena.push(node);
            NodeIdx::new(self.arena.len() - 1)
        }
    }

    fn release(&mut self, idx: NodeIdx) {
        self.arena[idx.get()].entries = Entries::Leaf(Vec::new());
        self.free.push(idx);
    }

    fn entries_bbox(arena: &[RNode<T, P>], entries: &Entries<T, P>) -> Option<Aabb2D<T>> {
        match entries {
            Entries::Leaf(items) => items.iter().map(|(bb, _)| *bb).reduce(union_aabb),
            Entries::Branch(kids) => kids
                .iter()
                .map(|k| arena[k.get()].bbox)
                .reduce(union_aabb),
        }
    }

    /// Recompute a node's bbox from its entries. Empty nodes keep their old box.
    fn refresh(&mut self, idx: NodeIdx) {
        if let Some(bb) = Self::entries_bbox(&self.arena, &self.arena[idx.get()].entries) {
            self.arena[idx.get()].bbox = bb;
        }
    }

    fn enlarge_cost(a: &Aabb2D<T>, b: &Aabb2D<T>) -> T::Acc {
        area(&union_aabb(*a, *b)) - area(a)
    }

    /// Child of a branch needing the least enlargement; ties go to the smaller child.
    fn choose_child(&self, at: NodeIdx, bbox: &Aabb2D<T>) -> Option<(usize, NodeIdx)> {
        let Entries::Branch(kids) = &self.arena[at.get()].entries else {
            return None;
        };
        let mut best: Option<(usize, NodeIdx, T::Acc, T::Acc)> = None;
        for (pos, &kid) in kids.iter().enumerate() {
            let kb = &self.arena[kid.get()].bbox;
            let cost = Self::enlarge_cost(kb, bbox);
            let size = area(kb);
            let better = match best {
                None => true,
                Some((_, _, bc, bs)) => cost < bc || (cost == bc && size < bs),
            };
            if better {
                best = Some((pos, kid, cost, size));
            }
        }
        best.map(|(pos, kid, _, _)| (pos, kid))
    }

    /// Split an overflowing node in place. Returns the new right sibling.
    fn split(&mut self, at: NodeIdx) -> NodeIdx {
        let min = self.config.min_children;
        let entries = core::mem::replace(
            &mut self.arena[at.get()].entries,
            Entries::Leaf(Vec::new()),
        );
        let (left, right) = match entries {
            Entries::Leaf(items) => {
                let (l, r) = split_entries(items, |(bb, _)| *bb, min);
                (Entries::Leaf(l), Entries::Leaf(r))
            }
            Entries::Branch(kids) => {
                let arena = &self.arena;
                let (l, r) = split_entries(kids, |k| arena[k.get()].bbox, min);
                (Entries::Branch(l), Entries::Branch(r))
            }
        };
        log::debug!("rtree split: {} + {} entries", left.len(), right.len());
        self.arena[at.get()].entries = left;
        self.refresh(at);
        let bbox = Self::entries_bbox(&self.arena, &right).unwrap_or(self.arena[at.get()].bbox);
        self.alloc(RNode {
            bbox,
            entries: right,
        })
    }

    /// Insert below `at`. Returns a new sibling for `at` if it had to split.
    fn insert_at(&mut self, at: NodeIdx, bbox: Aabb2D<T>, data: P) -> Option<NodeIdx> {
        let max = self.config.max_children;
        let node = &mut self.arena[at.get()];
        node.bbox = union_aabb(node.bbox, bbox);
        if let Entries::Leaf(items) = &mut node.entries {
            items.push((bbox, data));
            if items.len() <= max {
                return None;
            }
            return Some(self.split(at));
        }
        let Some((pos, kid)) = self.choose_child(at, &bbox) else {
            // A branch with no children holds nothing; reuse it as a leaf.
            self.arena[at.get()].entries = Entries::Leaf(vec![(bbox, data)]);
            return None;
        };
        let right = self.insert_at(kid, bbox, data)?;
        if let Entries::Branch(kids) = &mut self.arena[at.get()].entries {
            kids.insert(pos + 1, right);
            if kids.len() <= max {
                return None;
            }
        }
        Some(self.split(at))
    }

    /// Drop empty roots and single-child branch roots.
    fn condense_root(&mut self) {
        while let Some(root) = self.root {
            let next = match &self.arena[root.get()].entries {
                e if e.is_empty() => None,
                Entries::Branch(kids) if kids.len() == 1 => Some(kids[0]),
                _ => return,
            };
            self.release(root);
            self.root = next;
        }
    }

    fn visit_items<F>(&self, rect: Option<&Aabb2D<T>>, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        let Some(root) = self.root else {
            return ControlFlow::Continue(());
        };
        let hits = |bb: &Aabb2D<T>| rect.is_none_or(|r| bb.intersects(r));
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let node = &self.arena[i.get()];
            if !hits(&node.bbox) {
                continue;
            }
            match &node.entries {
                Entries::Leaf(items) => {
                    for (bb, data) in items {
                        if hits(bb) && visit(*bb, data).is_break() {
                            return ControlFlow::Break(());
                        }
                    }
                }
                Entries::Branch(kids) => stack.extend(kids.iter().rev().copied()),
            }
        }
        ControlFlow::Continue(())
    }
}

impl<T: Scalar, P> Hierarchy<T, P> for RTree<T, P> {
    type Node = NodeId;

    fn len(&self) -> usize {
        self.len
    }

    fn bounds(&self) -> Option<Aabb2D<T>> {
        self.root.map(|r| self.arena[r.get()].bbox)
    }

    fn clear(&mut self) {
        self.root = None;
        self.arena.clear();
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
            None => match self.root {
                Some(root) => root,
                None => return Ok(()),
            },
            Some(id) => {
                let idx = self.stamp.check(id)?;
                if idx >= self.arena.len() {
                    return Err(TraversalError::UnknownNode);
                }
                NodeIdx::new(idx)
            }
        };
        match &self.arena[at.get()].entries {
            Entries::Leaf(items) => {
                for (bbox, data) in items {
                    visit(Child::Item { bbox: *bbox, data });
                }
            }
            Entries::Branch(kids) => {
                for kid in kids {
                    visit(Child::Node {
                        bbox: self.arena[kid.get()].bbox,
                        node: self.stamp.issue(kid.get()),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<T: Scalar, P: PartialEq> RectIndex<T, P> for RTree<T, P> {
    fn insert(&mut self, bbox: Aabb2D<T>, data: P) {
        self.stamp.bump();
        self.len += 1;
        let Some(root) = self.root else {
            let node = RNode {
                bbox,
                entries: Entries::Leaf(vec![(bbox, data)]),
            };
            self.root = Some(self.alloc(node));
            return;
        };
        if let Some(right) = self.insert_at(root, bbox, data) {
            // Grow a level: old root and its new sibling under a fresh root.
            let bbox = union_aabb(self.arena[root.get()].bbox, self.arena[right.get()].bbox);
            let new_root = self.alloc(RNode {
                bbox,
                entries: Entries::Branch(vec![root, right]),
            });
            self.root = Some(new_root);
            log::debug!("rtree grew to depth {}", self.depth());
        }
    }

    fn delete(&mut self, bbox: Aabb2D<T>, data: &P) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if !self.remove_at(root, &bbox, data) {
            return false;
        }
        self.len -= 1;
        self.stamp.bump();
        self.condense_root();
        true
    }

    fn search<F>(&self, rect: Aabb2D<T>, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        self.visit_items(Some(&rect), visit)
    }

    fn scan<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Aabb2D<T>, &P) -> ControlFlow<()>,
    {
        self.visit_items(None, visit)
    }
}

impl<T: Scalar, P: PartialEq> RTree<T, P> {
    /// Remove the first item equal to `(bbox, data)` below `at`, releasing emptied children.
    fn remove_at(&mut self, at: NodeIdx, bbox: &Aabb2D<T>, data: &P) -> bool {
        if !self.arena[at.get()].bbox.contains(bbox) {
            return false;
        }
        let count = match &mut self.arena[at.get()].entries {
            Entries::Leaf(items) => {
                let Some(pos) = items.iter().position(|(b, d)| b == bbox && d == data) else {
                    return false;
                };
                items.remove(pos);
                self.refresh(at);
                return true;
            }
            Entries::Branch(kids) => kids.len(),
        };
        // The child list only changes once a removal succeeds, so positions stay valid.
        for pos in 0..count {
            let Entries::Branch(kids) = &self.arena[at.get()].entries else {
                return false;
            };
            let kid = kids[pos];
            if self.remove_at(kid, bbox, data) {
                if self.arena[kid.get()].entries.is_empty() {
                    if let Entries::Branch(kids) = &mut self.arena[at.get()].entries {
                        kids.remove(pos);
                    }
                    self.release(kid);
                }
                self.refresh(at);
                return true;
            }
        }
        false
    }
}

impl<T: Scalar, P> Debug for RTree<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("max_children", &self.config.max_children)
            .field("min_children", &self.config.min_children)
            .field("len", &self.len)
            .field("arena_nodes", &self.arena.len())
            .field("free_nodes", &self.free.len())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// Convenience type aliases.
/// R-tree with i64 coordinates and i128 metrics.
pub type RTreeI64<P> = RTree<i64, P>;

/// R-tree with f32 coordinates and f64 metrics.
pub type RTreeF32<P> = RTree<f32, P>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64<P> = RTree<f64, P>;
