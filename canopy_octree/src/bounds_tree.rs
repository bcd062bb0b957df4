// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public facade of the bounds tree: owns the root node, grows it outward
//! when an add misses, and shrinks it back after removals.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;
use core::mem;

use canopy_geom::{Aabb3D, DVec3, LooseCube, Octant, Plane3, Ray3};

use crate::bounds_node::BoundsNode;
use crate::types::{MoveOutcome, OctreeConfig, DEFAULT_GROW_ATTEMPTS};

/// A dynamic loose octree over axis-aligned bounding boxes.
///
/// Entries are `(key, bounds)` pairs with opaque, copyable keys; a key
/// appears at most once in the tree. The tree grows by doubling away from
/// its center when an add does not fit and shrinks back toward
/// `initial_size` when upper levels empty out.
pub struct BoundsOctree<K> {
    root: BoundsNode<K>,
    config: OctreeConfig,
    initial_size: f64,
    initial_center: DVec3,
}

impl<K: Copy + Eq + Hash + Debug> BoundsOctree<K> {
    /// Create a tree covering a cube of side `initial_size` at
    /// `initial_center`.
    ///
    /// `min_node_size` is clamped to at most `initial_size` and `looseness`
    /// to `[1, 2]`; both clamps log a warning.
    pub fn new(
        initial_size: f64,
        initial_center: DVec3,
        min_node_size: f64,
        looseness: f64,
    ) -> Self {
        debug_assert!(initial_size > 0.0, "initial size must be positive");
        let mut min_node_size = min_node_size;
        if min_node_size > initial_size {
            log::warn!(
                "octree: min node size {min_node_size} exceeds initial size {initial_size}; clamping"
            );
            min_node_size = initial_size;
        }
        let clamped = looseness.max(1.0).min(2.0);
        if clamped != looseness {
            log::warn!("octree: looseness {looseness} outside [1, 2]; clamping to {clamped}");
        }
        let config = OctreeConfig {
            looseness: clamped,
            min_node_size,
        };
        Self {
            root: BoundsNode::new(initial_center, initial_size, &config),
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

    /// Current bounds of `key`, if stored.
    pub fn get(&self, key: &K) -> Option<Aabb3D> {
        self.root.get(key)
    }

    /// The root's strict cube.
    pub fn bounds(&self) -> Aabb3D {
        self.root.cube().strict
    }

    /// The root's loose cube (the actual admissibility region).
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

    /// Visit every `(key, bounds)` entry.
    pub fn for_each(&self, mut visit: impl FnMut(&K, &Aabb3D)) {
        self.root.for_each(&mut visit);
    }

    // --- mutation ---

    /// Insert (or replace) an entry, growing the root up to
    /// [`DEFAULT_GROW_ATTEMPTS`] times when the bounds fall outside.
    pub fn add(&mut self, key: K, bounds: Aabb3D) -> bool {
        self.add_with_grow_limit(key, bounds, DEFAULT_GROW_ATTEMPTS)
    }

    /// [`add`](Self::add) with an explicit growth budget; 0 tries once and
    /// never grows.
    pub fn add_with_grow_limit(&mut self, key: K, bounds: Aabb3D, max_grow: usize) -> bool {
        let mut attempts = 0;
        while !self.root.add(key, bounds, &self.config) {
            if attempts >= max_grow {
                log::error!(
                    "octree add: bounds for {key:?} still outside the tree after {attempts} growth attempts"
                );
                return false;
            }
            self.grow(bounds.center() - self.root.cube().center);
            attempts += 1;
        }
        true
    }

    /// Drop every entry and reset the root to the construction cube.
    pub fn clear(&mut self) {
        self.root = BoundsNode::new(self.initial_center, self.initial_size, &self.config);
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

    /// Remove without merging or shrinking; cheaper under heavy churn.
    pub fn remove_no_merge(&mut self, key: K) -> bool {
        self.root.remove(key, false, &self.config)
    }

    /// Relocate an entry. The node layer first tries to move it in place;
    /// when the entry escapes the tree entirely, it is re-added here (with
    /// growth), and only a failed re-add surfaces as `Removed`.
    pub fn move_entry(&mut self, key: K, new_bounds: Aabb3D) -> MoveOutcome {
        match self.root.move_entry(key, new_bounds, true, &self.config) {
            MoveOutcome::Removed => {
                if self.add(key, new_bounds) {
                    MoveOutcome::Moved
                } else {
                    MoveOutcome::Removed
                }
            }
            outcome => outcome,
        }
    }

    /// Move when present, add when absent. Returns false only when the
    /// entry ended up outside the tree.
    pub fn add_or_move(&mut self, key: K, bounds: Aabb3D) -> bool {
        match self.move_entry(key, bounds) {
            MoveOutcome::Moved => true,
            MoveOutcome::Removed => false,
            MoveOutcome::NotFound => self.add(key, bounds),
        }
    }

    /// Shrink the root while its content fits one octant; never below the
    /// construction size.
    pub fn shrink_if_possible(&mut self) {
        let placeholder = BoundsNode::new(DVec3::ZERO, self.initial_size, &self.config);
        let root = mem::replace(&mut self.root, placeholder);
        self.root = root.shrink_if_possible(self.initial_size, &self.config);
    }

    /// Double the root away from its center so that growth happens toward
    /// `direction`; the old root becomes the child in the opposite octant.
    fn grow(&mut self, direction: DVec3) {
        let sign = DVec3::new(
            if direction.x >= 0.0 { 1.0 } else { -1.0 },
            if direction.y >= 0.0 { 1.0 } else { -1.0 },
            if direction.z >= 0.0 { 1.0 } else { -1.0 },
        );
        let old_cube = *self.root.cube();
        let half = old_cube.length * 0.5;
        let new_center = old_cube.center + sign * half;
        let new_root = BoundsNode::new(new_center, old_cube.length * 2.0, &self.config);
        let old_root = mem::replace(&mut self.root, new_root);
        if !old_root.is_empty() {
            // The old root sits opposite the growth direction; the other
            // seven children materialise lazily.
            let oct = Octant::from_offset(old_cube.center - new_center);
            let mut children = crate::bounds_node::empty_children();
            children[oct.index()] = Some(old_root);
            self.root.set_children(children);
        }
    }

    // --- queries ---

    /// Whether any entry's bounds intersect `query`.
    pub fn is_intersecting(&self, query: &Aabb3D) -> bool {
        self.root.is_intersecting(query, None)
    }

    /// [`is_intersecting`](Self::is_intersecting) restricted to entries
    /// the filter accepts.
    pub fn is_intersecting_filtered(
        &self,
        query: &Aabb3D,
        filter: impl Fn(&K, &Aabb3D) -> bool,
    ) -> bool {
        self.root.is_intersecting(query, Some(&filter))
    }

    /// Keys of all entries intersecting `query`, in unspecified order.
    pub fn get_intersecting(&self, query: &Aabb3D) -> Vec<K> {
        let mut out = Vec::new();
        self.root.collect_intersecting(query, None, &mut out);
        out
    }

    /// [`get_intersecting`](Self::get_intersecting) restricted by a filter.
    pub fn get_intersecting_filtered(
        &self,
        query: &Aabb3D,
        filter: impl Fn(&K, &Aabb3D) -> bool,
    ) -> Vec<K> {
        let mut out = Vec::new();
        self.root.collect_intersecting(query, Some(&filter), &mut out);
        out
    }

    /// Whether the ray hits any entry within `max_distance`.
    pub fn raycast(&self, ray: &Ray3, max_distance: f64) -> bool {
        self.root.is_ray_hitting(ray, max_distance, None)
    }

    /// [`raycast`](Self::raycast) restricted by a filter.
    pub fn raycast_filtered(
        &self,
        ray: &Ray3,
        max_distance: f64,
        filter: impl Fn(&K, &Aabb3D) -> bool,
    ) -> bool {
        self.root.is_ray_hitting(ray, max_distance, Some(&filter))
    }

    /// Keys of all entries the ray hits within `max_distance`.
    pub fn raycast_all(&self, ray: &Ray3, max_distance: f64) -> Vec<K> {
        let mut out = Vec::new();
        self.root.collect_ray_hits(ray, max_distance, None, &mut out);
        out
    }

    /// [`raycast_all`](Self::raycast_all) restricted by a filter.
    pub fn raycast_all_filtered(
        &self,
        ray: &Ray3,
        max_distance: f64,
        filter: impl Fn(&K, &Aabb3D) -> bool,
    ) -> Vec<K> {
        let mut out = Vec::new();
        self.root
            .collect_ray_hits(ray, max_distance, Some(&filter), &mut out);
        out
    }

    /// Keys of all entries at least partially inside the frustum described
    /// by `planes` (normals pointing inward).
    pub fn get_within_frustum(&self, planes: &[Plane3]) -> Vec<K> {
        let mut out = Vec::new();
        self.root.collect_in_frustum(planes, None, &mut out);
        out
    }

    /// [`get_within_frustum`](Self::get_within_frustum) restricted by a
    /// filter. The filter is forwarded through every level of recursion.
    pub fn get_within_frustum_filtered(
        &self,
        planes: &[Plane3],
        filter: impl Fn(&K, &Aabb3D) -> bool,
    ) -> Vec<K> {
        let mut out = Vec::new();
        self.root.collect_in_frustum(planes, Some(&filter), &mut out);
        out
    }

    /// Best-scoring entry across the whole tree. `node_filter` prunes
    /// traversal by node cube; `fitness` returns `None` to ignore an entry
    /// or a score where lower wins.
    pub fn find_best_match(
        &self,
        fitness: impl Fn(&K, &Aabb3D) -> Option<f64>,
        node_filter: impl Fn(&LooseCube) -> bool,
    ) -> Option<(K, f64)> {
        self.root.best_match(&fitness, &node_filter, None)
    }

    /// [`find_best_match`](Self::find_best_match) with an extra entry
    /// filter applied before scoring.
    pub fn find_best_match_filtered(
        &self,
        fitness: impl Fn(&K, &Aabb3D) -> Option<f64>,
        node_filter: impl Fn(&LooseCube) -> bool,
        entry_filter: impl Fn(&K, &Aabb3D) -> bool,
    ) -> Option<(K, f64)> {
        self.root
            .best_match(&fitness, &node_filter, Some(&entry_filter))
    }

    /// Debug hook: visit every node cube (with depth), for gizmo-style
    /// drawing by a host.
    pub fn visit_cubes(&self, mut visit: impl FnMut(&LooseCube, usize)) {
        self.root.visit_cubes(0, &mut visit);
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let counted = self.root.check_invariants(&self.config, true);
        assert_eq!(counted, self.len(), "count does not match stored entries");
    }
}

impl<K: Copy + Eq + Hash + Debug> core::fmt::Debug for BoundsOctree<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut nodes = 0;
        let mut depth = 0;
        self.root.visit_cubes(0, &mut |_, d| {
            nodes += 1;
            depth = depth.max(d);
        });
        f.debug_struct("BoundsOctree")
            .field("entries", &self.len())
            .field("nodes", &nodes)
            .field("depth", &depth)
            .field("center", &self.root.cube().center)
            .field("length", &self.root.cube().length)
            .finish_non_exhaustive()
    }
}
