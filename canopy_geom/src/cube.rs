// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strict/loose cube pairs for loose octree nodes.

use glam::DVec3;

use crate::aabb::Aabb3D;
use crate::octant::Octant;

/// Precomputed geometry for an octree node (or a prospective child).
///
/// The strict cube is the node's partition cell: an entry belongs to the
/// node whose strict cube contains its center, so each entry belongs to at
/// most one node per level. The loose cube is the admissibility region:
/// side `length * looseness`, so entries may overhang the strict cell by
/// the slack without being promoted to a larger ancestor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LooseCube {
    /// Cube center.
    pub center: DVec3,
    /// Strict side length.
    pub length: f64,
    /// The partition cell, side `length`.
    pub strict: Aabb3D,
    /// The admissibility region, side `length * looseness`.
    pub loose: Aabb3D,
}

impl LooseCube {
    /// Build the cube pair. `looseness` is a side multiplier, expected in
    /// `[1, 2]` (1 = no slack).
    pub fn new(center: DVec3, length: f64, looseness: f64) -> Self {
        let strict = Aabb3D::from_center_size(center, DVec3::splat(length));
        let loose = Aabb3D::from_center_size(center, DVec3::splat(length * looseness));
        Self {
            center,
            length,
            strict,
            loose,
        }
    }

    /// True iff the loose cube contains both corners of `bounds`.
    #[inline]
    pub fn loose_contains(&self, bounds: &Aabb3D) -> bool {
        self.loose.contains_point(bounds.min) && self.loose.contains_point(bounds.max)
    }

    /// True iff `bounds` fits the loose cube *and* its center lies in the
    /// strict cube. This is the ownership test: the entry belongs here.
    #[inline]
    pub fn encapsulates(&self, bounds: &Aabb3D) -> bool {
        self.loose_contains(bounds) && self.strict.contains_point(bounds.center())
    }

    /// Strict-cube point containment (point-entry ownership test).
    #[inline]
    pub fn contains_point(&self, p: DVec3) -> bool {
        self.strict.contains_point(p)
    }

    /// Octant of a point relative to this cube's center.
    #[inline]
    pub fn octant_of(&self, p: DVec3) -> Octant {
        Octant::from_offset(p - self.center)
    }

    /// The eight would-be children: centers offset by `length / 4` along
    /// each axis, side `length / 2`, looseness inherited.
    pub fn child_cubes(&self, looseness: f64) -> [LooseCube; 8] {
        let quarter = self.length * 0.25;
        let child_len = self.length * 0.5;
        Octant::ALL.map(|oct| {
            LooseCube::new(self.center + oct.direction() * quarter, child_len, looseness)
        })
    }
}
