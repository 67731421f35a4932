// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

/// A node handle passed to `children`/`for_each_child` was not one the index issued.
///
/// Traversal handles are only valid for the index that produced them and only
/// until that index is next modified. Anything else is a caller bug, reported
/// here instead of being treated as an empty node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TraversalError {
    /// The handle was issued by a different index instance.
    #[error("node handle was issued by a different index")]
    ForeignNode,
    /// The index was modified after the handle was issued.
    #[error("node handle is stale: the index was modified after it was issued")]
    StaleNode,
    /// The handle does not name a live internal node.
    #[error("node handle does not refer to a live internal node")]
    UnknownNode,
}

/// Invalid backend configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// R-tree nodes must be able to hold two children, or no level ever shrinks.
    #[error("max_children ({0}) must be at least 2")]
    MaxChildrenTooSmall(usize),
    /// R-tree nodes must allow at least one child.
    #[error("min_children must be at least 1")]
    MinChildrenZero,
    /// An overflowing R-tree node must be splittable into two valid halves.
    #[error("max_children ({max}) must be at least 2 * min_children - 1 (min_children = {min})")]
    FanoutTooSmall {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Quadtree buckets must hold at least one point.
    #[error("bucket_capacity must be at least 1")]
    BucketCapacityZero,
    /// Quadtree depth is limited to `PTreeConfig::MAX_DEPTH`.
    #[error("max_depth ({0}) exceeds the limit of 64")]
    MaxDepthTooLarge(usize),
    /// The point domain is inverted.
    #[error("point domain has max < min")]
    EmptyDomain,
}
