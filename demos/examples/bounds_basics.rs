// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds octree basics.
//!
//! Build a small tree, run box and ray queries, move an entry, and let
//! the root grow to cover a faraway add.
//!
//! Run:
//! - `cargo run -p canopy_demos --example bounds_basics`

use canopy_geom::{Aabb3D, DVec3, Ray3};
use canopy_octree::{BoundsOctree, MoveOutcome};

fn cube_at(center: DVec3, side: f64) -> Aabb3D {
    Aabb3D::from_center_size(center, DVec3::splat(side))
}

fn main() {
    let mut tree = BoundsOctree::new(16.0, DVec3::ZERO, 1.0, 1.25);
    tree.add("player", cube_at(DVec3::new(1.0, 0.0, 1.0), 1.0));
    tree.add("crate", cube_at(DVec3::new(5.0, 0.0, 5.0), 2.0));
    tree.add("lamp", cube_at(DVec3::new(-6.0, 2.0, 0.0), 0.5));
    println!("{tree:?}");

    // Box query around the crate.
    let probe = cube_at(DVec3::new(5.0, 0.0, 5.0), 3.0);
    println!("around the crate: {:?}", tree.get_intersecting(&probe));

    // Ray query down the x axis.
    let ray = Ray3::new(DVec3::new(-10.0, 0.0, 1.0), DVec3::X);
    println!("ray hits: {:?}", tree.raycast_all(&ray, 100.0));

    // Relocate the player; the old spot empties out.
    let outcome = tree.move_entry("player", cube_at(DVec3::new(-3.0, 0.0, -3.0), 1.0));
    assert_eq!(outcome, MoveOutcome::Moved);
    println!(
        "player after move: {:?}",
        tree.get_intersecting(&cube_at(DVec3::new(-3.0, 0.0, -3.0), 1.0))
    );

    // An add far outside the initial cube grows the root.
    tree.add("beacon", cube_at(DVec3::new(90.0, 0.0, 0.0), 2.0));
    println!(
        "root after growth: center {:?}, size {:?}",
        tree.bounds().center(),
        tree.bounds().size()
    );
    assert!(tree.contains(&"beacon"));
}
