// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public facade of the point tree.
//!
//! Points have no extent, so this tree runs without loose slack
//! (looseness 1); growth, shrink, and move recovery otherwise match the
//! bounds tree.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;
use core::mem;

use canopy_geom::{Aabb3D, DVec3, LooseCube, Octant, Ray3};

use crate::point_node::{empty_children, PointNode};
use crate::types::{MoveOutcome, OctreeConfig, DEFAULT_GROW_ATTEMPTS};

/// A dynamic octree over point entries.
///
/// Entries are `(key, position)` pairs with opaque, copyable keys; a key
/// appears at most once. Radius queries compare in squared space and are
/// exact (verified against linear scans in the tests); nearest-style
/// helpers are best-effort traversals, not heap-based kNN.
pub struct PointOctree<K> {
    root: PointNode<K>,
    config: OctreeConfig,
    initial_size: f64,
    initial_center: DVec3,
}

impl<K: Copy + Eq + Hash + Debug> PointOctree<K> {
    /// Create a tree covering a cube of side `initial_size` at
    /// `initial_center`. `min_node_size` is clamped to at most
    /// `initial_size` (with a warning).
    pub fn new(initial_size: f64, initial_center: DVec3, min_node_size: f64) -> Self {
        debug_assert!(initial_size > 0.0, "initial size must be positive");
        let mut min_node_size = min_node_size;
        if min_node_size > initial_size {
            log::warn!(
                "octree: min node size {min_node_size} exceeds initial size {initial_size}; clamping"
            );
            min_node_size = initial_size;
        }
        let config = OctreeConfig {
            looseness: 1.0,
            min_node_size,
        };
        Self {
            root: PointNode::new(initial_center, initial_size, &config),
            config,
            initial_size,
            initial_center,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// True when the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Whether `key` is stored anywhere in the tree.
    pub fn contains(&self, key: &K) -> bool {
        self.root.contains(key)
    }

    /// Current position of `key`, if stored.
    pub fn get(&self, key: &K) -> Option<DVec3> {
        self.root.get(key)
    }

    /// The root's strict cube.
    pub fn bounds(&self) -> Aabb3D {
        self.root.cube().strict
    }

    /// The root's loose cube. Equal to [`bounds`](Self::bounds) for the
    /// point tree, kept for parity with the bounds tree surface.
    pub fn loose_bounds(&self) -> Aabb3D {
        self.root.cube().loose
    }

    /// The tree configuration after clamping.
    pub fn config(&self) -> OctreeConfig {
        self.config
    }

    /// All keys, in unspecified order.
    pub fn keys(&self) -> Vec<K> {
        let mut out = Vec::with_capacity(self.len());
        self.root.for_each(&mut |key, _| out.push(*key));
        out
    }

    /// Visit every `(key, position)` entry.
    pub fn for_each(&self, mut visit: impl FnMut(&K, &DVec3)) {
        self.root.for_each(&mut visit);
    }

    // --- mutation ---

    /// Insert (or replace) a point, growing the root when it falls
    /// outside.
    pub fn add(&mut self, key: K, position: DVec3) -> bool {
        self.add_with_grow_limit(key, position, DEFAULT_GROW_ATTEMPTS)
    }

    /// [`add`](Self::add) with an explicit growth budget; 0 tries once and
    /// never grows.
    pub fn add_with_grow_limit(&mut self, key: K, position: DVec3, max_grow: usize) -> bool {
        let mut attempts = 0;
        while !self.root.add(key, position, &self.config) {
            if attempts >= max_grow {
                log::error!(
                    "octree add: position for {key:?} still outside the tree after {attempts} growth attempts"
                );
                return false;
            }
            self.grow(position - self.root.cube().center);
            attempts += 1;
        }
        true
    }

    /// Drop every entry and reset the root to the construction cube.
    pub fn clear(&mut self) {
        self.root = PointNode::new(self.initial_center, self.initial_size, &self.config);
    }

    /// Remove an entry, merging emptied nodes and shrinking the root when
    /// possible.
    pub fn remove(&mut self, key: K) -> bool {
        let removed = self.root.remove(key, true, &self.config);
        if removed {
            self.shrink_if_possible();
        }
        removed
    }

    /// Remove without merging or shrinking.
    pub fn remove_no_merge(&mut self, key: K) -> bool {
        self.root.remove(key, false, &self.config)
    }

    /// Relocate an entry; escaping entries are re-added (with growth) and
    /// only a failed re-add surfaces as `Removed`.
    pub fn move_entry(&mut self, key: K, new_position: DVec3) -> MoveOutcome {
        match self.root.move_entry(key, new_position, true, &self.config) {
            MoveOutcome::Removed => {
                if self.add(key, new_position) {
                    MoveOutcome::Moved
                } else {
                    MoveOutcome::Removed
                }
            }
            outcome => outcome,
        }
    }

    /// Move when present, add when absent.
    pub fn add_or_move(&mut self, key: K, position: DVec3) -> bool {
        match self.move_entry(key, position) {
            MoveOutcome::Moved => true,
            MoveOutcome::Removed => false,
            MoveOutcome::NotFound => self.add(key, position),
        }
    }

    /// Shrink the root while its content fits one octant; never below the
    /// construction size.
    pub fn shrink_if_possible(&mut self) {
        let placeholder = PointNode::new(DVec3::ZERO, self.initial_size, &self.config);
        let root = mem::replace(&mut self.root, placeholder);
        self.root = root.shrink_if_possible(self.initial_size, &self.config);
    }

    fn grow(&mut self, direction: DVec3) {
        let sign = DVec3::new(
            if direction.x >= 0.0 { 1.0 } else { -1.0 },
            if direction.y >= 0.0 { 1.0 } else { -1.0 },
            if direction.z >= 0.0 { 1.0 } else { -1.0 },
        );
        let old_cube = *self.root.cube();
        let half = old_cube.length * 0.5;
        let new_center = old_cube.center + sign * half;
        let new_root = PointNode::new(new_center, old_cube.length * 2.0, &self.config);
        let old_root = mem::replace(&mut self.root, new_root);
        if !old_root.is_empty() {
            let oct = Octant::from_offset(old_cube.center - new_center);
            let mut children = empty_children();
            children[oct.index()] = Some(old_root);
            self.root.set_children(children);
        }
    }

    // --- queries ---

    /// Keys of all points within `max_distance` of `center`.
    pub fn get_nearby(&self, center: DVec3, max_distance: f64) -> Vec<K> {
        let mut out = Vec::new();
        self.root
            .collect_nearby_point(center, max_distance, None, &mut out);
        out
    }

    /// [`get_nearby`](Self::get_nearby) restricted by a filter.
    pub fn get_nearby_filtered(
        &self,
        center: DVec3,
        max_distance: f64,
        filter: impl Fn(&K, &DVec3) -> bool,
    ) -> Vec<K> {
        let mut out = Vec::new();
        self.root
            .collect_nearby_point(center, max_distance, Some(&filter), &mut out);
        out
    }

    /// `(key, position, squared distance)` for all points within
    /// `max_distance` of `center`.
    pub fn get_nearby_with_distances(
        &self,
        center: DVec3,
        max_distance: f64,
    ) -> Vec<(K, DVec3, f64)> {
        let mut out = Vec::new();
        self.root
            .collect_nearby_point_with_distances(center, max_distance, None, &mut out);
        out
    }

    /// [`get_nearby_with_distances`](Self::get_nearby_with_distances)
    /// restricted by a filter.
    pub fn get_nearby_with_distances_filtered(
        &self,
        center: DVec3,
        max_distance: f64,
        filter: impl Fn(&K, &DVec3) -> bool,
    ) -> Vec<(K, DVec3, f64)> {
        let mut out = Vec::new();
        self.root.collect_nearby_point_with_distances(
            center,
            max_distance,
            Some(&filter),
            &mut out,
        );
        out
    }

    /// Keys of all points within perpendicular `max_distance` of the line
    /// through `ray` (the direction must be unit length).
    pub fn get_nearby_along_ray(&self, ray: &Ray3, max_distance: f64) -> Vec<K> {
        let mut out = Vec::new();
        self.root.collect_nearby_ray(ray, max_distance, None, &mut out);
        out
    }

    /// [`get_nearby_along_ray`](Self::get_nearby_along_ray) restricted by
    /// a filter.
    pub fn get_nearby_along_ray_filtered(
        &self,
        ray: &Ray3,
        max_distance: f64,
        filter: impl Fn(&K, &DVec3) -> bool,
    ) -> Vec<K> {
        let mut out = Vec::new();
        self.root
            .collect_nearby_ray(ray, max_distance, Some(&filter), &mut out);
        out
    }

    /// The point closest to the line through `ray` (perpendicular
    /// distance), with its position and squared distance. This is the
    /// "closest in view direction" convenience: pass a camera ray and get
    /// the best-aligned entry. An ad-hoc full traversal, not kNN.
    pub fn closest_to_ray(&self, ray: &Ray3) -> Option<(K, DVec3, f64)> {
        let mut best = None;
        self.root.closest_to_ray(ray, None, &mut best);
        best
    }

    /// [`closest_to_ray`](Self::closest_to_ray) restricted by a filter.
    pub fn closest_to_ray_filtered(
        &self,
        ray: &Ray3,
        filter: impl Fn(&K, &DVec3) -> bool,
    ) -> Option<(K, DVec3, f64)> {
        let mut best = None;
        self.root.closest_to_ray(ray, Some(&filter), &mut best);
        best
    }

    /// Best-scoring entry across the whole tree; `node_filter` prunes
    /// traversal, lower scores win, `None` ignores an entry.
    pub fn find_best_match(
        &self,
        fitness: impl Fn(&K, &DVec3) -> Option<f64>,
        node_filter: impl Fn(&LooseCube) -> bool,
    ) -> Option<(K, f64)> {
        self.root.best_match(&fitness, &node_filter, None)
    }

    /// [`find_best_match`](Self::find_best_match) with an extra entry
    /// filter.
    pub fn find_best_match_filtered(
        &self,
        fitness: impl Fn(&K, &DVec3) -> Option<f64>,
        node_filter: impl Fn(&LooseCube) -> bool,
        entry_filter: impl Fn(&K, &DVec3) -> bool,
    ) -> Option<(K, f64)> {
        self.root
            .best_match(&fitness, &node_filter, Some(&entry_filter))
    }

    /// Debug hook: visit every node cube (with depth), root first.
    pub fn visit_cubes(&self, mut visit: impl FnMut(&LooseCube, usize)) {
        self.root.visit_cubes(0, &mut visit);
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let counted = self.root.check_invariants(&self.config, true);
        assert_eq!(counted, self.len(), "count does not match stored entries");
    }
}

impl<K: Copy + Eq + Hash + Debug> core::fmt::Debug for PointOctree<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut nodes = 0;
        let mut depth = 0;
        self.root.visit_cubes(0, &mut |_, d| {
            nodes += 1;
            depth = depth.max(d);
        });
        f.debug_struct("PointOctree")
            .field("entries", &self.len())
            .field("nodes", &nodes)
            .field("depth", &depth)
            .field("center", &self.root.cube().center)
            .field("length", &self.root.cube().length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    fn random_point(rng: &mut SmallRng, extent: f64) -> DVec3 {
        DVec3::new(
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        )
    }

    #[test]
    fn thousand_random_points_radius_query_matches_scan() {
        let mut rng = SmallRng::seed_from_u64(0x9e3779b9);
        let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
        let mut points = Vec::new();
        for i in 0..1000u32 {
            let p = random_point(&mut rng, 5.0);
            assert!(tree.add(i, p));
            points.push((i, p));
        }
        assert_eq!(tree.len(), 1000);
        tree.check_invariants();

        let hits = sorted(tree.get_nearby(DVec3::ZERO, 1.0));
        let expected: Vec<u32> = points
            .iter()
            .filter(|(_, p)| p.length_squared() <= 1.0)
            .map(|(i, _)| *i)
            .collect();
        assert_eq!(hits, sorted(expected));
    }

    #[test]
    fn split_drains_the_own_map() {
        let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
        // Nine points spread across octants so the split pushes every one
        // of them into a child.
        for (i, oct) in Octant::ALL.iter().enumerate() {
            assert!(tree.add(i as u32, oct.direction() * 2.5));
        }
        assert!(tree.add(8, DVec3::new(1.0, 2.0, 3.0)));
        let mut leaf_depth_entries = 0;
        tree.for_each(|_, _| leaf_depth_entries += 1);
        assert_eq!(leaf_depth_entries, 9);
        let mut nodes = 0;
        tree.visit_cubes(|_, _| nodes += 1);
        assert!(nodes > 1, "ninth insert must split");
        tree.check_invariants();
        // All nine must now sit below the root: removing them one by one
        // still works through the summary map.
        for i in 0..9u32 {
            assert!(tree.remove(i));
        }
        assert!(tree.is_empty());
        tree.check_invariants();
    }

    #[test]
    fn duplicate_add_replaces_position() {
        let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
        assert!(tree.add(1, DVec3::splat(2.0)));
        assert!(tree.add(1, DVec3::splat(-2.0)));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&1), Some(DVec3::splat(-2.0)));
    }

    #[test]
    fn far_point_grows_the_root() {
        let mut tree = PointOctree::new(4.0, DVec3::ZERO, 1.0);
        assert!(tree.add(1, DVec3::new(0.5, 0.5, 0.5)));
        assert!(tree.add(2, DVec3::new(60.0, 0.0, 0.0)));
        assert!(tree.contains(&1));
        assert!(tree.contains(&2));
        assert!(tree.bounds().size().x >= 64.0);
        assert_eq!(sorted(tree.get_nearby(DVec3::new(60.0, 0.0, 0.0), 1.0)), vec![2]);
        assert_eq!(
            sorted(tree.get_nearby(DVec3::new(0.5, 0.5, 0.5), 0.1)),
            vec![1]
        );
        tree.check_invariants();
    }

    #[test]
    fn move_within_and_out_of_node() {
        let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
        assert!(tree.add(1, DVec3::splat(1.0)));
        assert_eq!(tree.move_entry(1, DVec3::splat(-1.0)), MoveOutcome::Moved);
        assert_eq!(tree.get(&1), Some(DVec3::splat(-1.0)));
        // Outside the root: re-added through growth.
        assert_eq!(
            tree.move_entry(1, DVec3::new(25.0, 0.0, 0.0)),
            MoveOutcome::Moved
        );
        assert_eq!(tree.get(&1), Some(DVec3::new(25.0, 0.0, 0.0)));
        assert_eq!(tree.move_entry(77, DVec3::ZERO), MoveOutcome::NotFound);
        tree.check_invariants();
    }

    #[test]
    fn nearby_with_distances_reports_squared_space() {
        let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
        assert!(tree.add(1, DVec3::new(3.0, 0.0, 0.0)));
        assert!(tree.add(2, DVec3::new(0.0, 4.0, 0.0)));
        assert!(tree.add(3, DVec3::new(4.0, 4.0, 0.0)));
        let mut hits = tree.get_nearby_with_distances(DVec3::ZERO, 4.5);
        hits.sort_by_key(|(k, _, _)| *k);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], (1, DVec3::new(3.0, 0.0, 0.0), 9.0));
        assert_eq!(hits[1], (2, DVec3::new(0.0, 4.0, 0.0), 16.0));
    }

    #[test]
    fn ray_radius_uses_perpendicular_distance() {
        let mut tree = PointOctree::new(20.0, DVec3::ZERO, 0.5);
        assert!(tree.add(1, DVec3::new(5.0, 1.0, 0.0)));
        assert!(tree.add(2, DVec3::new(7.0, 4.0, 0.0)));
        // Behind the origin: the line test has no segment clamping.
        assert!(tree.add(3, DVec3::new(-6.0, 0.5, 0.0)));
        let ray = Ray3::new(DVec3::ZERO, DVec3::X);
        assert_eq!(sorted(tree.get_nearby_along_ray(&ray, 2.0)), vec![1, 3]);
        assert_eq!(sorted(tree.get_nearby_along_ray(&ray, 5.0)), vec![1, 2, 3]);
        let filtered = tree.get_nearby_along_ray_filtered(&ray, 5.0, |k, _| *k != 2);
        assert_eq!(sorted(filtered), vec![1, 3]);
    }

    #[test]
    fn closest_to_ray_picks_best_aligned_point() {
        let mut tree = PointOctree::new(20.0, DVec3::ZERO, 0.5);
        assert!(tree.add(1, DVec3::new(5.0, 3.0, 0.0)));
        assert!(tree.add(2, DVec3::new(8.0, 0.5, 0.0)));
        assert!(tree.add(3, DVec3::new(2.0, -4.0, 0.0)));
        let ray = Ray3::new(DVec3::ZERO, DVec3::X);
        let (key, position, d2) = tree.closest_to_ray(&ray).expect("tree is non-empty");
        assert_eq!(key, 2);
        assert_eq!(position, DVec3::new(8.0, 0.5, 0.0));
        assert_eq!(d2, 0.25);
        let best = tree
            .closest_to_ray_filtered(&ray, |k, _| *k != 2)
            .expect("filter leaves candidates");
        assert_eq!(best.0, 1);
    }

    #[test]
    fn best_match_with_node_pruning() {
        let mut tree = PointOctree::new(16.0, DVec3::ZERO, 0.5);
        for i in 0..20u32 {
            let p = DVec3::new(f64::from(i) * 0.7 - 7.0, f64::from(i % 3) - 1.0, 0.0);
            assert!(tree.add(i, p));
        }
        let target = DVec3::new(3.0, 0.0, 0.0);
        // Prune nodes whose cube is beyond 6 units of the target.
        let found = tree.find_best_match(
            |_, p| Some((*p - target).length_squared()),
            |cube| cube.loose.distance_squared_to(target) <= 36.0,
        );
        let (key, score) = found.expect("candidates exist near the target");
        // Verify against a scan.
        let mut best_scan: Option<(u32, f64)> = None;
        tree.for_each(|k, p| {
            let d = (*p - target).length_squared();
            if best_scan.map_or(true, |(_, s)| d < s) {
                best_scan = Some((*k, d));
            }
        });
        assert_eq!(Some((key, score)), best_scan);
    }

    #[test]
    fn shrink_collapses_leaf_root_by_four() {
        let mut tree = PointOctree::new(4.0, DVec3::ZERO, 1.0);
        assert!(tree.add(1, DVec3::new(10.0, 10.0, 10.0)));
        assert!(tree.add(2, DVec3::new(10.5, 10.5, 10.5)));
        assert_eq!(tree.bounds().size().x, 16.0);
        assert!(tree.remove(1));
        // Two-level collapse, preserved on purpose (see DESIGN.md).
        assert_eq!(tree.bounds().size().x, 4.0);
        assert_eq!(tree.bounds().center(), DVec3::new(10.0, 10.0, 10.0));
        assert!(tree.contains(&2));
    }

    #[test]
    fn clear_resets_to_the_construction_cube() {
        let mut tree = PointOctree::new(10.0, DVec3::ZERO, 0.5);
        assert!(tree.add(1, DVec3::new(40.0, 0.0, 0.0)));
        assert!(tree.bounds().size().x > 10.0);
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.bounds().size(), DVec3::splat(10.0));
        assert_eq!(tree.bounds().center(), DVec3::ZERO);
    }

    #[test]
    fn randomized_churn_agrees_with_linear_scan() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut tree = PointOctree::new(16.0, DVec3::ZERO, 0.5);
        let mut model: Vec<(u32, DVec3)> = Vec::new();

        // Opposite-octant sentinels keep the root out of the childless
        // collapse path (see the bounds-tree churn test).
        assert!(tree.add(9000, DVec3::splat(6.0)));
        assert!(tree.add(9001, DVec3::splat(-6.0)));
        model.push((9000, DVec3::splat(6.0)));
        model.push((9001, DVec3::splat(-6.0)));

        let mut next_key = 0u32;
        for step in 0..600 {
            let roll: f64 = rng.gen();
            if roll < 0.5 || model.len() <= 2 {
                let p = random_point(&mut rng, 7.5);
                assert!(tree.add(next_key, p));
                model.push((next_key, p));
                next_key += 1;
            } else if roll < 0.75 {
                let pick = rng.gen_range(2..model.len());
                let (key, _) = model.swap_remove(pick);
                assert!(tree.remove(key));
            } else {
                let pick = rng.gen_range(2..model.len());
                let p = random_point(&mut rng, 7.5);
                let key = model[pick].0;
                assert_eq!(tree.move_entry(key, p), MoveOutcome::Moved);
                model[pick].1 = p;
            }

            if step % 25 == 0 {
                tree.check_invariants();
                assert_eq!(tree.len(), model.len());
                let center = random_point(&mut rng, 6.0);
                let radius = rng.gen_range(0.5..6.0);
                let expected: Vec<u32> = model
                    .iter()
                    .filter(|(_, p)| (*p - center).length_squared() <= radius * radius)
                    .map(|(k, _)| *k)
                    .collect();
                assert_eq!(sorted(tree.get_nearby(center, radius)), sorted(expected));
            }
        }
        tree.check_invariants();
    }
}
