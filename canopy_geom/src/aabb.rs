// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-precision axis-aligned bounding box.

use glam::DVec3;

use crate::ray::Ray3;

/// Axis-aligned bounding box in 3D, stored as min/max corners.
///
/// Containment and intersection are closed: a point on a face is inside,
/// and two boxes touching at a face intersect.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Aabb3D {
    /// Minimum corner (inclusive).
    pub min: DVec3,
    /// Maximum corner (inclusive).
    pub max: DVec3,
}

impl Aabb3D {
    /// Create an AABB from min and max corners.
    ///
    /// # Panics
    /// Debug-asserts that `min <= max` on all axes.
    pub fn new(min: DVec3, max: DVec3) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "AABB min must be <= max on all axes"
        );
        Self { min, max }
    }

    /// Create an AABB from its center and full side lengths.
    pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Center of the box.
    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Full side lengths (max - min).
    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Half side lengths.
    #[inline]
    pub fn half_size(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Whether the box contains a point (faces count as inside).
    #[inline]
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Whether two boxes overlap (touching counts).
    #[inline]
    pub fn intersects(&self, other: &Aabb3D) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The box grown by `margin` on every face.
    #[inline]
    pub fn expanded_by(&self, margin: f64) -> Aabb3D {
        let m = DVec3::splat(margin);
        Aabb3D {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Smallest box covering both operands.
    pub fn union(&self, other: &Aabb3D) -> Aabb3D {
        Aabb3D {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Closest point of the box to `p` (clamped per axis; `p` itself when
    /// inside).
    #[inline]
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        p.clamp(self.min, self.max)
    }

    /// Squared distance from `p` to the box surface, 0 when inside.
    #[inline]
    pub fn distance_squared_to(&self, p: DVec3) -> f64 {
        (self.closest_point(p) - p).length_squared()
    }

    /// Slab test against a ray. Returns the entry distance along the ray
    /// (in units of `ray.dir`), or `None` when the ray misses.
    ///
    /// A ray starting inside the box reports distance `0.0`. The direction
    /// need not be normalised; a zero component produces infinities the
    /// min/max folding absorbs.
    pub fn intersect_ray(&self, ray: &Ray3) -> Option<f64> {
        let inv = DVec3::ONE / ray.dir;
        let t0 = (self.min - ray.origin) * inv;
        let t1 = (self.max - ray.origin) * inv;
        let t_near = t0.min(t1);
        let t_far = t0.max(t1);
        let t_enter = t_near.x.max(t_near.y).max(t_near.z);
        let t_exit = t_far.x.min(t_far.y).min(t_far.z);
        if t_enter > t_exit || t_exit < 0.0 {
            return None;
        }
        Some(t_enter.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_center_size_round_trips() {
        let b = Aabb3D::from_center_size(DVec3::new(1.0, 2.0, 3.0), DVec3::splat(4.0));
        assert_eq!(b.min, DVec3::new(-1.0, 0.0, 1.0));
        assert_eq!(b.max, DVec3::new(3.0, 4.0, 5.0));
        assert_eq!(b.center(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.size(), DVec3::splat(4.0));
    }

    #[test]
    fn contains_point_closed() {
        let b = Aabb3D::new(DVec3::ZERO, DVec3::splat(10.0));
        assert!(b.contains_point(DVec3::splat(5.0)));
        assert!(b.contains_point(DVec3::ZERO));
        assert!(b.contains_point(DVec3::splat(10.0)));
        assert!(!b.contains_point(DVec3::splat(-0.001)));
        assert!(!b.contains_point(DVec3::new(5.0, 10.1, 5.0)));
    }

    #[test]
    fn intersects_touching_counts() {
        let a = Aabb3D::new(DVec3::ZERO, DVec3::splat(10.0));
        let b = Aabb3D::new(DVec3::splat(10.0), DVec3::splat(20.0));
        let c = Aabb3D::new(DVec3::splat(10.5), DVec3::splat(20.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb3D::new(DVec3::ZERO, DVec3::splat(2.0));
        let b = Aabb3D::new(DVec3::splat(-1.0), DVec3::new(1.0, 3.0, 1.0));
        let u = a.union(&b);
        assert_eq!(u.min, DVec3::splat(-1.0));
        assert_eq!(u.max, DVec3::new(2.0, 3.0, 2.0));
    }

    #[test]
    fn closest_point_distance() {
        let b = Aabb3D::new(DVec3::ZERO, DVec3::splat(2.0));
        // Inside: distance 0.
        assert_eq!(b.distance_squared_to(DVec3::splat(1.0)), 0.0);
        // Straight out along +x from the face.
        assert_eq!(b.distance_squared_to(DVec3::new(5.0, 1.0, 1.0)), 9.0);
        // Corner distance: (1,1,1) away from (2,2,2).
        assert_eq!(b.distance_squared_to(DVec3::splat(3.0)), 3.0);
    }

    #[test]
    fn ray_hits_and_misses() {
        let b = Aabb3D::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let hit = b.intersect_ray(&Ray3::new(DVec3::new(-5.0, 0.0, 0.0), DVec3::X));
        assert_eq!(hit, Some(4.0));
        let miss = b.intersect_ray(&Ray3::new(DVec3::new(-5.0, 3.0, 0.0), DVec3::X));
        assert_eq!(miss, None);
        // Pointing away.
        let behind = b.intersect_ray(&Ray3::new(DVec3::new(-5.0, 0.0, 0.0), -DVec3::X));
        assert_eq!(behind, None);
    }

    #[test]
    fn ray_from_inside_reports_zero() {
        let b = Aabb3D::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let hit = b.intersect_ray(&Ray3::new(DVec3::ZERO, DVec3::new(0.3, 0.9, 0.1)));
        assert_eq!(hit, Some(0.0));
    }

    #[test]
    fn ray_axis_aligned_zero_components() {
        // dir has two zero components; slab math must still resolve.
        let b = Aabb3D::new(DVec3::new(2.0, -1.0, -1.0), DVec3::new(4.0, 1.0, 1.0));
        let hit = b.intersect_ray(&Ray3::new(DVec3::ZERO, DVec3::X));
        assert_eq!(hit, Some(2.0));
        let miss = b.intersect_ray(&Ray3::new(DVec3::new(0.0, 2.0, 0.0), DVec3::X));
        assert_eq!(miss, None);
    }
}
