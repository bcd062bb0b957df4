// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Half-space planes and the frustum-vs-AABB test.

use glam::DVec3;

use crate::aabb::Aabb3D;

/// A plane in constant-normal form: points `p` with `normal · p + d = 0`.
///
/// The normal points toward the inside half-space, as is conventional for
/// frustum plane sets.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane3 {
    /// Plane normal (need not be normalised for sidedness tests).
    pub normal: DVec3,
    /// Signed offset.
    pub d: f64,
}

impl Plane3 {
    /// Create a plane from normal and offset.
    pub const fn new(normal: DVec3, d: f64) -> Self {
        Self { normal, d }
    }

    /// Plane through `point` with the given normal.
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance from `p` (scaled by `|normal|`).
    #[inline]
    pub fn distance_to(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }
}

/// Whether `aabb` is at least partially inside the intersection of the
/// half-spaces described by `planes`.
///
/// Positive-vertex test: for each plane, take the box corner farthest
/// along the normal; if even that corner is outside, the whole box is.
/// An empty plane set rejects nothing.
pub fn intersects_frustum(planes: &[Plane3], aabb: &Aabb3D) -> bool {
    for plane in planes {
        let positive = DVec3::new(
            if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
            if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
            if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
        );
        if plane.distance_to(positive) < 0.0 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(center: DVec3) -> Aabb3D {
        Aabb3D::from_center_size(center, DVec3::splat(1.0))
    }

    // An axis-aligned "slab frustum": x in [0, 10].
    fn slab_planes() -> [Plane3; 2] {
        [
            Plane3::from_point_normal(DVec3::ZERO, DVec3::X),
            Plane3::from_point_normal(DVec3::new(10.0, 0.0, 0.0), -DVec3::X),
        ]
    }

    #[test]
    fn inside_and_outside_slab() {
        let planes = slab_planes();
        assert!(intersects_frustum(&planes, &unit_box_at(DVec3::new(5.0, 0.0, 0.0))));
        assert!(!intersects_frustum(&planes, &unit_box_at(DVec3::new(12.0, 0.0, 0.0))));
        assert!(!intersects_frustum(&planes, &unit_box_at(DVec3::new(-2.0, 0.0, 0.0))));
    }

    #[test]
    fn straddling_counts_as_inside() {
        let planes = slab_planes();
        assert!(intersects_frustum(&planes, &unit_box_at(DVec3::new(0.0, 0.0, 0.0))));
        assert!(intersects_frustum(&planes, &unit_box_at(DVec3::new(10.2, 0.0, 0.0))));
    }

    #[test]
    fn empty_plane_set_accepts() {
        assert!(intersects_frustum(&[], &unit_box_at(DVec3::ZERO)));
    }
}
