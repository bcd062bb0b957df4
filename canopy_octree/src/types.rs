// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared vocabulary for both trees: capacity constants, the move result,
//! per-tree configuration, and filter signatures.

use canopy_geom::{Aabb3D, DVec3};

/// Entries a node holds before it splits (and the inclusive threshold at
/// or below which a parent is eligible to merge its children back).
pub const NODE_CAPACITY: usize = 8;

/// Root doublings [`add`](crate::BoundsOctree::add) performs before giving
/// up on an entry outside the tree.
pub const DEFAULT_GROW_ATTEMPTS: usize = 20;

/// Result of a relocation attempt.
///
/// `Removed` means the entry left the subtree it was found in and was not
/// re-homed; the tree facades recover from this by re-adding (growing the
/// root if needed) and only surface `Removed` when that re-add fails too.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The key is not in the tree.
    NotFound,
    /// The entry was taken out but could not be placed at its new
    /// geometry.
    Removed,
    /// The entry now lives at its new geometry.
    Moved,
}

/// Read-only tree configuration, fixed at construction and threaded into
/// node operations as context.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OctreeConfig {
    /// Loose-cube side multiplier in `[1, 2]`; 1 means no slack.
    pub looseness: f64,
    /// Nodes shorter than twice this never split.
    pub min_node_size: f64,
}

/// Entry filter for bounds-tree queries. Filtered-out entries are skipped
/// at the leaf checks; traversal is not pruned.
pub type BoundsFilter<'a, K> = dyn Fn(&K, &Aabb3D) -> bool + 'a;

/// Entry filter for point-tree queries.
pub type PointFilter<'a, K> = dyn Fn(&K, &DVec3) -> bool + 'a;
