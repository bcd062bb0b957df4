// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point octree radius queries.
//!
//! Scatter points on a spiral, query a radius around the origin, check
//! the result against a linear scan, and find the point best aligned
//! with a view ray.
//!
//! Run:
//! - `cargo run -p canopy_demos --example point_nearby`

use canopy_geom::{DVec3, Ray3};
use canopy_octree::PointOctree;

fn main() {
    let mut tree = PointOctree::new(20.0, DVec3::ZERO, 0.5);
    let mut points = Vec::new();
    for i in 0..200u32 {
        let t = f64::from(i) * 0.31;
        let r = 0.05 * f64::from(i);
        let p = DVec3::new(r * t.cos(), (f64::from(i % 7) - 3.0) * 0.4, r * t.sin());
        tree.add(i, p);
        points.push((i, p));
    }
    println!("{tree:?}");

    let radius = 2.5;
    let mut hits = tree.get_nearby(DVec3::ZERO, radius);
    hits.sort_unstable();
    let mut expected: Vec<u32> = points
        .iter()
        .filter(|(_, p)| p.length_squared() <= radius * radius)
        .map(|(i, _)| *i)
        .collect();
    expected.sort_unstable();
    assert_eq!(hits, expected, "radius query must match the linear scan");
    println!("{} points within {radius} of the origin", hits.len());

    // Closest point to a view ray through the cloud.
    let view = Ray3::new(DVec3::new(0.0, 0.0, -15.0), DVec3::Z);
    if let Some((key, position, d2)) = tree.closest_to_ray(&view) {
        println!("best aligned with the view ray: {key} at {position:?} (d^2 = {d2:.3})");
    }
}
