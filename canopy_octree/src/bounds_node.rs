// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recursive node of the bounds tree.
//!
//! A node stores the entries it owns in `own`, a summary map from key to
//! child octant for every entry deeper in its subtree (`child_octants`),
//! and up to eight lazily materialised children. The summary map is what
//! makes removal and relocation descend in O(1) instead of probing all
//! eight children.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use canopy_geom::{intersects_frustum, Aabb3D, LooseCube, Octant, Plane3, Ray3};
use hashbrown::HashMap;

use crate::types::{BoundsFilter, MoveOutcome, OctreeConfig, NODE_CAPACITY};

type Children<K> = Box<[Option<BoundsNode<K>>; 8]>;

pub(crate) fn empty_children<K>() -> Children<K> {
    Box::new([(); 8].map(|_| None))
}

pub(crate) struct BoundsNode<K> {
    cube: LooseCube,
    /// Would-be children, precomputed so best-fit checks never allocate.
    child_cubes: [LooseCube; 8],
    own: HashMap<K, Aabb3D>,
    /// Octant of the child subtree holding each deeper entry. `Some` iff
    /// `children` is `Some`.
    child_octants: Option<HashMap<K, Octant>>,
    children: Option<Children<K>>,
}

impl<K: Copy + Eq + Hash + Debug> BoundsNode<K> {
    pub(crate) fn new(center: glam::DVec3, length: f64, config: &OctreeConfig) -> Self {
        Self::from_cube(LooseCube::new(center, length, config.looseness), config)
    }

    pub(crate) fn from_cube(cube: LooseCube, config: &OctreeConfig) -> Self {
        Self {
            cube,
            child_cubes: cube.child_cubes(config.looseness),
            own: HashMap::new(),
            child_octants: None,
            children: None,
        }
    }

    /// Re-center and resize in place, keeping the entry maps. Used by the
    /// childless shrink collapse.
    fn set_values(&mut self, center: glam::DVec3, length: f64, config: &OctreeConfig) {
        self.cube = LooseCube::new(center, length, config.looseness);
        self.child_cubes = self.cube.child_cubes(config.looseness);
    }

    pub(crate) fn cube(&self) -> &LooseCube {
        &self.cube
    }

    /// Entries in this subtree. O(1): the summary map already counts every
    /// deeper entry.
    pub(crate) fn count(&self) -> usize {
        self.own.len() + self.child_octants.as_ref().map_or(0, HashMap::len)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub(crate) fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.own.contains_key(key)
            || self
                .child_octants
                .as_ref()
                .is_some_and(|m| m.contains_key(key))
    }

    pub(crate) fn get(&self, key: &K) -> Option<Aabb3D> {
        if let Some(bounds) = self.own.get(key) {
            return Some(*bounds);
        }
        let oct = *self.child_octants.as_ref()?.get(key)?;
        self.child(oct)?.get(key)
    }

    fn child(&self, oct: Octant) -> Option<&BoundsNode<K>> {
        self.children.as_ref()?[oct.index()].as_ref()
    }

    fn child_or_create(&mut self, oct: Octant, config: &OctreeConfig) -> &mut BoundsNode<K> {
        let cube = self.child_cubes[oct.index()];
        let slot = &mut self
            .children
            .as_mut()
            .expect("children allocated before descent")[oct.index()];
        slot.get_or_insert_with(|| BoundsNode::from_cube(cube, config))
    }

    fn summary_mut(&mut self) -> &mut HashMap<K, Octant> {
        self.child_octants.get_or_insert_with(HashMap::new)
    }

    // --- add ---

    /// Admit an entry if it fits the loose cube. Re-adding an existing key
    /// replaces its geometry (with a warning).
    pub(crate) fn add(&mut self, key: K, bounds: Aabb3D, config: &OctreeConfig) -> bool {
        if !self.cube.loose_contains(&bounds) {
            return false;
        }
        // Duplicate probe: drop any stale copy before re-inserting.
        if self.remove(key, false, config) {
            log::warn!("octree add: key {key:?} was already present; replacing its bounds");
        }
        self.push_down(key, bounds, config);
        true
    }

    /// Place an entry somewhere in this subtree. The caller has already
    /// verified loose containment.
    fn push_down(&mut self, key: K, bounds: Aabb3D, config: &OctreeConfig) {
        if self.children.is_none() {
            let at_capacity = self.own.len() >= NODE_CAPACITY;
            let splittable = self.cube.length * 0.5 >= config.min_node_size;
            if !at_capacity || !splittable {
                self.own.insert(key, bounds);
                return;
            }
            self.split(config);
        }
        let oct = self.cube.octant_of(bounds.center());
        if !self.child_cubes[oct.index()].encapsulates(&bounds) {
            // Straddles the midplanes: lives here, at the smallest node
            // whose strict cube holds its center.
            self.own.insert(key, bounds);
            return;
        }
        self.child_or_create(oct, config).push_down(key, bounds, config);
        self.summary_mut().insert(key, oct);
    }

    /// Redistribute own entries into children where they fit.
    fn split(&mut self, config: &OctreeConfig) {
        self.children = Some(empty_children());
        if self.child_octants.is_none() {
            self.child_octants = Some(HashMap::new());
        }
        let entries: Vec<(K, Aabb3D)> = self.own.iter().map(|(k, b)| (*k, *b)).collect();
        for (key, bounds) in entries {
            let oct = self.cube.octant_of(bounds.center());
            if self.child_cubes[oct.index()].encapsulates(&bounds) {
                self.own.remove(&key);
                self.child_or_create(oct, config).push_down(key, bounds, config);
                self.summary_mut().insert(key, oct);
            }
        }
    }

    // --- remove / merge ---

    pub(crate) fn remove(&mut self, key: K, merge_if_able: bool, config: &OctreeConfig) -> bool {
        let mut removed = self.own.remove(&key).is_some();
        if !removed {
            let oct = self
                .child_octants
                .as_ref()
                .and_then(|m| m.get(&key).copied());
            if let Some(oct) = oct {
                removed = match self
                    .children
                    .as_mut()
                    .and_then(|c| c[oct.index()].as_mut())
                {
                    Some(child) => child.remove(key, merge_if_able, config),
                    None => {
                        log::error!(
                            "octree remove: summary points key {key:?} at a missing child"
                        );
                        false
                    }
                };
                self.summary_mut().remove(&key);
            }
        }
        if removed && merge_if_able && self.should_merge() {
            self.merge();
        }
        removed
    }

    /// Merge is worthwhile once the whole subtree fits in one node again.
    /// The threshold is inclusive, so split-then-merge has no hysteresis.
    fn should_merge(&self) -> bool {
        self.children.is_some() && self.count() <= NODE_CAPACITY
    }

    /// Pull every descendant entry up into this node and drop the children.
    fn merge(&mut self) {
        if let Some(children) = self.children.take() {
            for child in (*children).into_iter().flatten() {
                let mut child = child;
                child.merge();
                for (key, bounds) in child.own {
                    self.own.insert(key, bounds);
                }
            }
        }
        self.child_octants = None;
    }

    // --- move ---

    /// Relocate in place where possible. The root gates re-insertion on its
    /// loose cube only (the facade grows on failure); interior nodes insist
    /// on full encapsulation so entries that drift out bubble upward.
    pub(crate) fn move_entry(
        &mut self,
        key: K,
        new_bounds: Aabb3D,
        is_root: bool,
        config: &OctreeConfig,
    ) -> MoveOutcome {
        let admits = |cube: &LooseCube| {
            if is_root {
                cube.loose_contains(&new_bounds)
            } else {
                cube.encapsulates(&new_bounds)
            }
        };

        if self.own.remove(&key).is_some() {
            if admits(&self.cube) {
                self.push_down(key, new_bounds, config);
                return MoveOutcome::Moved;
            }
            if self.should_merge() {
                self.merge();
            }
            return MoveOutcome::Removed;
        }

        let old_oct = self
            .child_octants
            .as_ref()
            .and_then(|m| m.get(&key).copied());
        let Some(old_oct) = old_oct else {
            return MoveOutcome::NotFound;
        };
        let new_oct = self.cube.octant_of(new_bounds.center());

        if new_oct == old_oct {
            let Some(child) = self
                .children
                .as_mut()
                .and_then(|c| c[old_oct.index()].as_mut())
            else {
                log::error!("octree move: summary points key {key:?} at a missing child");
                return MoveOutcome::NotFound;
            };
            return match child.move_entry(key, new_bounds, false, config) {
                MoveOutcome::Moved => MoveOutcome::Moved,
                MoveOutcome::NotFound => {
                    log::error!("octree move: key {key:?} vanished from child subtree");
                    MoveOutcome::NotFound
                }
                MoveOutcome::Removed => {
                    // Escaped the child but may still belong at this level.
                    self.summary_mut().remove(&key);
                    if admits(&self.cube) {
                        self.own.insert(key, new_bounds);
                        MoveOutcome::Moved
                    } else {
                        MoveOutcome::Removed
                    }
                }
            };
        }

        // Crossed into another octant: take it out of the old child, then
        // re-place from here.
        if let Some(child) = self
            .children
            .as_mut()
            .and_then(|c| c[old_oct.index()].as_mut())
        {
            child.remove(key, true, config);
        }
        self.summary_mut().remove(&key);
        if admits(&self.cube) {
            self.push_down(key, new_bounds, config);
            MoveOutcome::Moved
        } else {
            if self.should_merge() {
                self.merge();
            }
            MoveOutcome::Removed
        }
    }

    // --- shrink ---

    /// Try to replace this root with a smaller one. Returns `self`
    /// unchanged unless every entry fits a single child octant.
    ///
    /// When the winner octant has a child node, that child is promoted and
    /// the old root's own entries are pushed into it. When this node is
    /// childless it instead resizes in place to *half* the winning child
    /// cube, a two-level collapse per call; kept as-is deliberately (see
    /// `shrink_collapses_leaf_root_by_four` in the tree tests).
    pub(crate) fn shrink_if_possible(mut self, min_length: f64, config: &OctreeConfig) -> Self {
        if self.cube.length < 2.0 * min_length {
            return self;
        }
        if self.own.is_empty() && !self.has_children() {
            return self;
        }

        let mut winner: Option<Octant> = None;
        for bounds in self.own.values() {
            let oct = self.cube.octant_of(bounds.center());
            if winner.is_some() && winner != Some(oct) {
                return self;
            }
            if !self.child_cubes[oct.index()].loose_contains(bounds) {
                return self;
            }
            winner = Some(oct);
        }

        if let Some(children) = &self.children {
            let mut occupied = false;
            for (index, child) in children.iter().enumerate() {
                let Some(child) = child else { continue };
                if child.is_empty() {
                    continue;
                }
                if occupied {
                    return self;
                }
                if winner.is_some_and(|w| w.index() != index) {
                    return self;
                }
                occupied = true;
                winner = Some(Octant::from_index(index));
            }
            if !occupied && self.own.is_empty() {
                return self;
            }
        }

        let Some(winner) = winner else { return self };

        if self.children.is_none() {
            let target = self.child_cubes[winner.index()];
            self.set_values(target.center, target.length * 0.5, config);
            return self;
        }

        let mut children = self.children.take().expect("checked above");
        let mut promoted = children[winner.index()]
            .take()
            .unwrap_or_else(|| BoundsNode::from_cube(self.child_cubes[winner.index()], config));
        for (key, bounds) in self.own {
            promoted.push_down(key, bounds, config);
        }
        promoted
    }

    // --- growth adoption ---

    /// Adopt a prebuilt child array (root growth) and rebuild the summary
    /// map from the adopted subtrees.
    pub(crate) fn set_children(&mut self, children: Children<K>) {
        let mut summary = HashMap::new();
        for (index, child) in children.iter().enumerate() {
            if let Some(child) = child {
                let oct = Octant::from_index(index);
                child.for_each(&mut |key, _| {
                    summary.insert(*key, oct);
                });
            }
        }
        self.child_octants = Some(summary);
        self.children = Some(children);
    }

    // --- queries ---

    pub(crate) fn is_intersecting(
        &self,
        query: &Aabb3D,
        filter: Option<&BoundsFilter<'_, K>>,
    ) -> bool {
        if !self.cube.loose.intersects(query) {
            return false;
        }
        for (key, bounds) in &self.own {
            if filter.is_some_and(|f| !f(key, bounds)) {
                continue;
            }
            if bounds.intersects(query) {
                return true;
            }
        }
        self.for_each_child(|child| child.is_intersecting(query, filter))
    }

    pub(crate) fn collect_intersecting(
        &self,
        query: &Aabb3D,
        filter: Option<&BoundsFilter<'_, K>>,
        out: &mut Vec<K>,
    ) {
        if !self.cube.loose.intersects(query) {
            return;
        }
        for (key, bounds) in &self.own {
            if filter.is_some_and(|f| !f(key, bounds)) {
                continue;
            }
            if bounds.intersects(query) {
                out.push(*key);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.collect_intersecting(query, filter, out);
            }
        }
    }

    pub(crate) fn is_ray_hitting(
        &self,
        ray: &Ray3,
        max_distance: f64,
        filter: Option<&BoundsFilter<'_, K>>,
    ) -> bool {
        if !self.ray_reaches_cube(ray, max_distance) {
            return false;
        }
        for (key, bounds) in &self.own {
            if filter.is_some_and(|f| !f(key, bounds)) {
                continue;
            }
            if bounds.intersect_ray(ray).is_some_and(|d| d <= max_distance) {
                return true;
            }
        }
        self.for_each_child(|child| child.is_ray_hitting(ray, max_distance, filter))
    }

    pub(crate) fn collect_ray_hits(
        &self,
        ray: &Ray3,
        max_distance: f64,
        filter: Option<&BoundsFilter<'_, K>>,
        out: &mut Vec<K>,
    ) {
        if !self.ray_reaches_cube(ray, max_distance) {
            return;
        }
        for (key, bounds) in &self.own {
            if filter.is_some_and(|f| !f(key, bounds)) {
                continue;
            }
            if bounds.intersect_ray(ray).is_some_and(|d| d <= max_distance) {
                out.push(*key);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.collect_ray_hits(ray, max_distance, filter, out);
            }
        }
    }

    fn ray_reaches_cube(&self, ray: &Ray3, max_distance: f64) -> bool {
        self.cube
            .loose
            .intersect_ray(ray)
            .is_some_and(|d| d <= max_distance)
    }

    pub(crate) fn collect_in_frustum(
        &self,
        planes: &[Plane3],
        filter: Option<&BoundsFilter<'_, K>>,
        out: &mut Vec<K>,
    ) {
        if !intersects_frustum(planes, &self.cube.loose) {
            return;
        }
        for (key, bounds) in &self.own {
            if filter.is_some_and(|f| !f(key, bounds)) {
                continue;
            }
            if intersects_frustum(planes, bounds) {
                out.push(*key);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.collect_in_frustum(planes, filter, out);
            }
        }
    }

    pub(crate) fn best_match(
        &self,
        fitness: &dyn Fn(&K, &Aabb3D) -> Option<f64>,
        node_filter: &dyn Fn(&LooseCube) -> bool,
        entry_filter: Option<&BoundsFilter<'_, K>>,
    ) -> Option<(K, f64)> {
        if !node_filter(&self.cube) {
            return None;
        }
        let mut best: Option<(K, f64)> = None;
        let mut offer = |key: K, score: f64| {
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((key, score));
            }
        };
        for (key, bounds) in &self.own {
            if entry_filter.is_some_and(|f| !f(key, bounds)) {
                continue;
            }
            if let Some(score) = fitness(key, bounds) {
                offer(*key, score);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                if let Some((key, score)) = child.best_match(fitness, node_filter, entry_filter) {
                    offer(key, score);
                }
            }
        }
        best
    }

    // --- visitors ---

    /// Visit every entry in the subtree.
    pub(crate) fn for_each(&self, visit: &mut dyn FnMut(&K, &Aabb3D)) {
        for (key, bounds) in &self.own {
            visit(key, bounds);
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.for_each(visit);
            }
        }
    }

    /// Debug hook: visit every node cube with its depth, root first.
    pub(crate) fn visit_cubes(&self, depth: usize, visit: &mut dyn FnMut(&LooseCube, usize)) {
        visit(&self.cube, depth);
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.visit_cubes(depth + 1, visit);
            }
        }
    }

    fn for_each_child(&self, mut pred: impl FnMut(&BoundsNode<K>) -> bool) -> bool {
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                if pred(child) {
                    return true;
                }
            }
        }
        false
    }

    // --- test support ---

    /// Walk the subtree asserting the structural invariants; returns the
    /// entry count seen. The root is allowed to own entries admitted by its
    /// loose cube alone (the move path permits that, and the facade grows
    /// to repair it), so the strict-center check applies below the root.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, config: &OctreeConfig, is_root: bool) -> usize {
        for (key, bounds) in &self.own {
            assert!(
                self.cube.loose_contains(bounds),
                "entry {key:?} overhangs its node's loose cube"
            );
            assert!(
                is_root || self.cube.strict.contains_point(bounds.center()),
                "entry {key:?} center is outside its node's strict cube"
            );
        }
        if self.children.is_none() {
            assert!(
                self.child_octants.as_ref().map_or(0, HashMap::len) == 0,
                "summary map without children"
            );
            assert!(
                self.own.len() <= NODE_CAPACITY
                    || self.cube.length < 2.0 * config.min_node_size,
                "oversized leaf that could still split"
            );
            return self.own.len();
        }
        let summary = self.child_octants.as_ref().expect("summary with children");
        let mut deep = 0;
        let children = self.children.as_ref().expect("checked");
        for (index, child) in children.iter().enumerate() {
            if let Some(child) = child {
                let sub = child.check_invariants(config, false);
                let mut claimed = 0;
                for oct in summary.values() {
                    if oct.index() == index {
                        claimed += 1;
                    }
                }
                assert_eq!(sub, claimed, "summary disagrees with child {index} contents");
                deep += sub;
            }
        }
        assert_eq!(deep, summary.len(), "summary counts a missing entry");
        for (key, oct) in summary {
            let child = children[oct.index()]
                .as_ref()
                .unwrap_or_else(|| panic!("summary points {key:?} at missing child"));
            assert!(child.contains(key), "summary points {key:?} at wrong child");
            assert!(!self.own.contains_key(key), "key {key:?} stored twice");
        }
        self.own.len() + deep
    }
}
