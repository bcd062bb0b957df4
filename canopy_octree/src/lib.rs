// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Octree: dynamic loose octrees for 3D spatial indexing.
//!
//! Two parallel trees share one recursive node engine:
//!
//! - [`BoundsOctree`] indexes axis-aligned bounding boxes.
//! - [`PointOctree`] indexes points.
//!
//! Both support incremental [`add`](BoundsOctree::add),
//! [`remove`](BoundsOctree::remove), and [`move_entry`](BoundsOctree::move_entry)
//! at runtime, and answer intersection, radius, frustum, and best-match
//! queries far faster than linear scans.
//!
//! ## Loose nodes
//!
//! Each node pairs a strict cube (its partition cell) with a loose cube
//! scaled by a per-tree looseness factor. An entry belongs to the node
//! whose strict cube holds its center but is admissible as long as its
//! extent fits the loose cube. That slack is what keeps a tiny box that
//! straddles a midplane from being hoisted into a giant ancestor, the
//! classic failure of plain octrees.
//!
//! ## Growing and shrinking
//!
//! The root doubles away from its center when an add falls outside
//! (bounded by a growth budget) and shrinks back toward the construction
//! size when the upper levels empty out. Nodes split past
//! [`NODE_CAPACITY`] entries (unless already at the minimum node size)
//! and merge again when a subtree fits in one node.
//!
//! ## Example
//!
//! ```rust
//! use canopy_octree::BoundsOctree;
//! use canopy_geom::{Aabb3D, DVec3};
//!
//! let mut tree = BoundsOctree::new(16.0, DVec3::ZERO, 1.0, 1.25);
//! tree.add("crate", Aabb3D::from_center_size(DVec3::ZERO, DVec3::splat(1.0)));
//! tree.add("barrel", Aabb3D::from_center_size(DVec3::splat(7.0), DVec3::splat(1.0)));
//!
//! let probe = Aabb3D::from_center_size(DVec3::splat(7.0), DVec3::splat(2.0));
//! assert_eq!(tree.get_intersecting(&probe), vec!["barrel"]);
//! ```
//!
//! ```rust
//! use canopy_octree::PointOctree;
//! use canopy_geom::DVec3;
//!
//! let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
//! tree.add(1u32, DVec3::new(0.4, 0.0, 0.0));
//! tree.add(2u32, DVec3::new(4.0, 4.0, 0.0));
//! assert_eq!(tree.get_nearby(DVec3::ZERO, 1.0), vec![1]);
//! ```
//!
//! ## Contract
//!
//! Keys are opaque, copyable, and hashable; a key appears at most once per
//! tree (re-adding replaces the geometry and warns through [`log`]).
//! Single-threaded: callers needing concurrency serialise access
//! externally. Query results carry no ordering guarantee. Coordinates are
//! finite `f64`; NaNs are out of contract.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod bounds_node;
mod point_node;

pub mod bounds_tree;
pub mod point_tree;
pub mod types;

pub use bounds_tree::BoundsOctree;
pub use point_tree::PointOctree;
pub use types::{
    BoundsFilter, MoveOutcome, OctreeConfig, PointFilter, DEFAULT_GROW_ATTEMPTS, NODE_CAPACITY,
};

// Re-export the geometry the public surface speaks in.
pub use canopy_geom::{Aabb3D, DVec3, LooseCube, Octant, Plane3, Ray3};
