// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for the two halves of a hybrid index.
//!
//! - `ptree`: bucketed point quadtree over a fixed domain (aliases: `PTreeF32`, `PTreeF64`, `PTreeI64`).
//!   The default point side.
//! - `rtree`: generic R-tree (`T: Scalar`) with SAH-like split and STR bulk loading
//!   (aliases: `RTreeI64`, `RTreeF32`, `RTreeF64`). The default rectangle side.
//! - `flatvec`: flat vector with linear scans (small, simple). Serves either side.
//!
//! SAH note
//! --------
//! For a split point `k` along a sorted axis the R-tree minimizes:
//!
//! `cost(k) = area(LB_k) * k + area(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` are the bounding boxes of the first `k` and remaining `n - k` items.
//! All `k` are evaluated in O(n) per axis using prefix/suffix bounding boxes.
//! Accumulators are widened (`f32`→`f64`, `f64`→`f64`, `i64`→`i128`) for robust comparisons.

pub mod flatvec;
pub mod ptree;
pub mod rtree;

pub use flatvec::FlatVec;
pub use ptree::{PTree, PTreeF32, PTreeF64, PTreeI64};
pub use rtree::{RTree, RTreeF32, RTreeF64, RTreeI64};
