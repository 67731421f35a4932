// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tuning knobs for the bundled backends.

use crate::error::ConfigError;

/// R-tree fan-out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RTreeConfig {
    /// Maximum children per node before it splits.
    pub max_children: usize,
    /// Minimum children on each side of a split.
    pub min_children: usize,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            max_children: 8,
            min_children: 4,
        }
    }
}

impl RTreeConfig {
    /// Check that overflowing nodes (`max_children + 1` entries) can always be split
    /// into two halves of at least `min_children` each.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_children < 2 {
            return Err(ConfigError::MaxChildrenTooSmall(self.max_children));
        }
        if self.min_children == 0 {
            return Err(ConfigError::MinChildrenZero);
        }
        if 2 * self.min_children > self.max_children + 1 {
            return Err(ConfigError::FanoutTooSmall {
                min: self.min_children,
                max: self.max_children,
            });
        }
        Ok(())
    }
}

/// Point quadtree bucket sizing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PTreeConfig {
    /// Points a leaf holds before it subdivides.
    pub bucket_capacity: usize,
    /// Depth below which leaves never subdivide; such leaves may exceed `bucket_capacity`.
    pub max_depth: usize,
}

impl Default for PTreeConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: 16,
            max_depth: 16,
        }
    }
}

impl PTreeConfig {
    /// Deepest subdivision level a quadtree may be configured with.
    pub const MAX_DEPTH: usize = 64;

    /// Check that buckets can hold at least one point and depth stays within [`Self::MAX_DEPTH`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_capacity == 0 {
            return Err(ConfigError::BucketCapacityZero);
        }
        if self.max_depth > Self::MAX_DEPTH {
            return Err(ConfigError::MaxDepthTooLarge(self.max_depth));
        }
        Ok(())
    }
}

/// Configuration for a [`HybridIndex`](crate::HybridIndex) using the bundled backends.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HybridConfig {
    /// Settings for the point side.
    pub point: PTreeConfig,
    /// Settings for the rectangle side.
    pub rect: RTreeConfig,
}

impl HybridConfig {
    /// Validate both halves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.point.validate()?;
        self.rect.validate()
    }
}
