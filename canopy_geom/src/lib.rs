// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Geom: geometry primitives for the canopy loose octrees.
//!
//! This crate holds the small, copyable value types the octree crates are
//! built from:
//!
//! - [`Aabb3D`]: a double-precision axis-aligned bounding box with closed
//!   containment and intersection semantics, a slab ray test, and a
//!   closest-point distance used for sphere pruning.
//! - [`Ray3`]: origin + direction, with a squared perpendicular distance
//!   helper for point queries.
//! - [`Plane3`]: a half-space, plus [`intersects_frustum`] for testing an
//!   AABB against a set of frustum planes.
//! - [`Octant`]: one of the eight sectors around a cube center, encoded as
//!   a three-bit mask.
//! - [`LooseCube`]: the paired strict/loose cubes that give a loose octree
//!   node its admissibility region.
//!
//! It is deliberately free of any engine coupling: no cameras, no meshes,
//! no drawing. Higher layers compute world-space geometry and feed it here.
//!
//! ## Float semantics
//!
//! Coordinates are `f64` (via [`glam::DVec3`]). Inputs are assumed to be
//! finite; NaNs are out of contract and debug builds may assert.
//!
//! This crate is `no_std`.

#![no_std]

pub mod aabb;
pub mod cube;
pub mod octant;
pub mod plane;
pub mod ray;

pub use aabb::Aabb3D;
pub use cube::LooseCube;
pub use octant::Octant;
pub use plane::{intersects_frustum, Plane3};
pub use ray::Ray3;

pub use glam::DVec3;
