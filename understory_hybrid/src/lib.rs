// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_hybrid --heading-base-level=0

//! Understory Hybrid: a 2D index for a mix of points and rectangles.
//!
//! Understory Hybrid stores exact points and axis-aligned boxes side by side by
//! routing each item to a structure suited to its shape.
//!
//! - Degenerate boxes (min == max) inside a fixed domain go to a point index.
//! - Everything else, including points outside the domain, goes to a rectangle index.
//! - Search, scan, bounds, and hierarchical traversal present both as one index.
//!
//! It is generic over the scalar type `T` and does not depend on any geometry crate.
//! With the `kurbo` feature, `kurbo::Rect` and `kurbo::Point` convert into [`Aabb2D<f64>`].
//!
//! # Example
//!
//! ```rust
//! use core::ops::ControlFlow;
//! use understory_hybrid::{Aabb2D, Hierarchy, HybridIndex};
//!
//! let domain = Aabb2D::new(-180.0, -90.0, 180.0, 90.0);
//! let mut idx: HybridIndex<f64, &str> = HybridIndex::new(domain);
//! idx.insert(Aabb2D::from_point(1.0, 1.0), "A");
//! idx.insert(Aabb2D::new(10.0, 10.0, 20.0, 20.0), "B");
//! assert_eq!(idx.len(), 2);
//! assert_eq!(idx.bounds(), Some(Aabb2D::new(1.0, 1.0, 20.0, 20.0)));
//!
//! // Points are visited first; breaking stops the whole query.
//! let mut hits = Vec::new();
//! let _ = idx.search(Aabb2D::new(0.0, 0.0, 15.0, 15.0), |_, data| {
//!     hits.push(*data);
//!     ControlFlow::Continue(())
//! });
//! assert_eq!(hits, ["A", "B"]);
//!
//! idx.delete(Aabb2D::from_point(1.0, 1.0), &"A");
//! assert_eq!(idx.len(), 1);
//! ```
//!
//! Traversal walks both trees as one hierarchy. Node handles are tagged with the
//! tree that issued them and expire when the index is modified:
//!
//! ```rust
//! use understory_hybrid::{Aabb2D, Child, Hierarchy, HybridI64};
//!
//! let mut idx: HybridI64<u32> = HybridI64::new(Aabb2D::new(0, 0, 1000, 1000));
//! idx.extend((0..100).map(|i| (Aabb2D::from_point(i * 7, i * 3), i as u32)));
//! idx.extend((0..100).map(|i| (Aabb2D::new(i, i, i + 50, i + 5), 100 + i as u32)));
//!
//! let mut items = 0;
//! let mut stack = vec![None];
//! while let Some(parent) = stack.pop() {
//!     for child in idx.children(parent, Vec::new()).unwrap() {
//!         match child {
//!             Child::Item { .. } => items += 1,
//!             Child::Node { node, .. } => stack.push(Some(node)),
//!         }
//!     }
//! }
//! assert_eq!(items, 200);
//! ```
//!
//! ## Choosing backends
//!
//! - [`PTree`] (default point side): bucketed quadtree over the domain. Tune with
//!   [`PTreeConfig`].
//! - [`RTree`] (default rect side): R-tree with SAH-like splits and STR bulk loading.
//!   Tune with [`RTreeConfig`].
//! - [`FlatVec`]: linear scans; serves either side, good for very small sets and tests.
//!
//! Any [`PointIndex`] / [`RectIndex`] pair can be combined with [`HybridIndex::from_parts`].
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.
//! SAH metrics use widened accumulators to reduce precision pitfalls.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod hybrid;
pub mod types;

pub use backend::{Child, Hierarchy, NodeId, PointIndex, RectIndex};
pub use backends::flatvec::FlatVec;
pub use backends::ptree::{PTree, PTreeF32, PTreeF64, PTreeI64};
pub use backends::rtree::{RTree, RTreeF32, RTreeF64, RTreeI64};
pub use config::{HybridConfig, PTreeConfig, RTreeConfig};
pub use error::{ConfigError, TraversalError};
pub use hybrid::{HybridF32, HybridF64, HybridI64, HybridIndex, HybridNode, HybridStats, Route};
pub use types::{Aabb2D, Scalar};
