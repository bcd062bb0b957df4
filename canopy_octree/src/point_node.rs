// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recursive node of the point tree.
//!
//! Same shape as the bounds node, specialised to point entries: points
//! have no extent, so the best-fit child always admits them and a split
//! drains the node's own map completely. The point tree runs with
//! looseness 1 (strict and loose cubes coincide).

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use canopy_geom::{DVec3, LooseCube, Octant, Ray3};
use hashbrown::HashMap;

use crate::types::{MoveOutcome, OctreeConfig, PointFilter, NODE_CAPACITY};

type Children<K> = Box<[Option<PointNode<K>>; 8]>;

pub(crate) fn empty_children<K>() -> Children<K> {
    Box::new([(); 8].map(|_| None))
}

pub(crate) struct PointNode<K> {
    cube: LooseCube,
    child_cubes: [LooseCube; 8],
    own: HashMap<K, DVec3>,
    child_octants: Option<HashMap<K, Octant>>,
    children: Option<Children<K>>,
}

impl<K: Copy + Eq + Hash + Debug> PointNode<K> {
    pub(crate) fn new(center: DVec3, length: f64, config: &OctreeConfig) -> Self {
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

    fn set_values(&mut self, center: DVec3, length: f64, config: &OctreeConfig) {
        self.cube = LooseCube::new(center, length, config.looseness);
        self.child_cubes = self.cube.child_cubes(config.looseness);
    }

    pub(crate) fn cube(&self) -> &LooseCube {
        &self.cube
    }

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

    pub(crate) fn get(&self, key: &K) -> Option<DVec3> {
        if let Some(position) = self.own.get(key) {
            return Some(*position);
        }
        let oct = *self.child_octants.as_ref()?.get(key)?;
        self.children.as_ref()?[oct.index()].as_ref()?.get(key)
    }

    fn child_or_create(&mut self, oct: Octant, config: &OctreeConfig) -> &mut PointNode<K> {
        let cube = self.child_cubes[oct.index()];
        let slot = &mut self
            .children
            .as_mut()
            .expect("children allocated before descent")[oct.index()];
        slot.get_or_insert_with(|| PointNode::from_cube(cube, config))
    }

    fn summary_mut(&mut self) -> &mut HashMap<K, Octant> {
        self.child_octants.get_or_insert_with(HashMap::new)
    }

    // --- add ---

    pub(crate) fn add(&mut self, key: K, position: DVec3, config: &OctreeConfig) -> bool {
        if !self.cube.loose.contains_point(position) {
            return false;
        }
        if self.remove(key, false, config) {
            log::warn!("octree add: key {key:?} was already present; replacing its position");
        }
        self.push_down(key, position, config);
        true
    }

    fn push_down(&mut self, key: K, position: DVec3, config: &OctreeConfig) {
        if self.children.is_none() {
            let at_capacity = self.own.len() >= NODE_CAPACITY;
            let splittable = self.cube.length * 0.5 >= config.min_node_size;
            if !at_capacity || !splittable {
                self.own.insert(key, position);
                return;
            }
            self.split(config);
        }
        let oct = self.cube.octant_of(position);
        if !self.child_cubes[oct.index()].loose.contains_point(position) {
            // Only reachable for positions outside the strict cube (a root
            // admitted via its loose cube); they stay at this level.
            self.own.insert(key, position);
            return;
        }
        self.child_or_create(oct, config).push_down(key, position, config);
        self.summary_mut().insert(key, oct);
    }

    /// Points always fit their best-fit child, so a split drains the own
    /// map entirely.
    fn split(&mut self, config: &OctreeConfig) {
        self.children = Some(empty_children());
        if self.child_octants.is_none() {
            self.child_octants = Some(HashMap::new());
        }
        let entries: Vec<(K, DVec3)> = self.own.iter().map(|(k, p)| (*k, *p)).collect();
        for (key, position) in entries {
            let oct = self.cube.octant_of(position);
            if self.child_cubes[oct.index()].loose.contains_point(position) {
                self.own.remove(&key);
                self.child_or_create(oct, config).push_down(key, position, config);
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

    fn should_merge(&self) -> bool {
        self.children.is_some() && self.count() <= NODE_CAPACITY
    }

    fn merge(&mut self) {
        if let Some(children) = self.children.take() {
            for child in (*children).into_iter().flatten() {
                let mut child = child;
                child.merge();
                for (key, position) in child.own {
                    self.own.insert(key, position);
                }
            }
        }
        self.child_octants = None;
    }

    // --- move ---

    pub(crate) fn move_entry(
        &mut self,
        key: K,
        new_position: DVec3,
        is_root: bool,
        config: &OctreeConfig,
    ) -> MoveOutcome {
        let admits = |cube: &LooseCube| {
            if is_root {
                cube.loose.contains_point(new_position)
            } else {
                cube.contains_point(new_position)
            }
        };

        if self.own.remove(&key).is_some() {
            if admits(&self.cube) {
                self.push_down(key, new_position, config);
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
        let new_oct = self.cube.octant_of(new_position);

        if new_oct == old_oct {
            let Some(child) = self
                .children
                .as_mut()
                .and_then(|c| c[old_oct.index()].as_mut())
            else {
                log::error!("octree move: summary points key {key:?} at a missing child");
                return MoveOutcome::NotFound;
            };
            return match child.move_entry(key, new_position, false, config) {
                MoveOutcome::Moved => MoveOutcome::Moved,
                MoveOutcome::NotFound => {
                    log::error!("octree move: key {key:?} vanished from child subtree");
                    MoveOutcome::NotFound
                }
                MoveOutcome::Removed => {
                    self.summary_mut().remove(&key);
                    if admits(&self.cube) {
                        self.own.insert(key, new_position);
                        MoveOutcome::Moved
                    } else {
                        MoveOutcome::Removed
                    }
                }
            };
        }

        if let Some(child) = self
            .children
            .as_mut()
            .and_then(|c| c[old_oct.index()].as_mut())
        {
            child.remove(key, true, config);
        }
        self.summary_mut().remove(&key);
        if admits(&self.cube) {
            self.push_down(key, new_position, config);
            MoveOutcome::Moved
        } else {
            if self.should_merge() {
                self.merge();
            }
            MoveOutcome::Removed
        }
    }

    // --- shrink ---

    /// Same protocol as the bounds node, including the preserved two-level
    /// collapse when this node is childless.
    pub(crate) fn shrink_if_possible(mut self, min_length: f64, config: &OctreeConfig) -> Self {
        if self.cube.length < 2.0 * min_length {
            return self;
        }
        if self.own.is_empty() && !self.has_children() {
            return self;
        }

        let mut winner: Option<Octant> = None;
        for position in self.own.values() {
            let oct = self.cube.octant_of(*position);
            if winner.is_some() && winner != Some(oct) {
                return self;
            }
            if !self.child_cubes[oct.index()].loose.contains_point(*position) {
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
            .unwrap_or_else(|| PointNode::from_cube(self.child_cubes[winner.index()], config));
        for (key, position) in self.own {
            promoted.push_down(key, position, config);
        }
        promoted
    }

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

    // --- radius queries ---

    /// Points within `max_distance` of `center`. The node prune is the
    /// closest-point-on-cube distance, so boxes the sphere misses are
    /// skipped without per-entry work.
    pub(crate) fn collect_nearby_point(
        &self,
        center: DVec3,
        max_distance: f64,
        filter: Option<&PointFilter<'_, K>>,
        out: &mut Vec<K>,
    ) {
        if self.cube.loose.distance_squared_to(center) > max_distance * max_distance {
            return;
        }
        for (key, position) in &self.own {
            if filter.is_some_and(|f| !f(key, position)) {
                continue;
            }
            if (*position - center).length_squared() <= max_distance * max_distance {
                out.push(*key);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.collect_nearby_point(center, max_distance, filter, out);
            }
        }
    }

    /// Like [`collect_nearby_point`](Self::collect_nearby_point) but also
    /// reports position and squared distance per hit.
    pub(crate) fn collect_nearby_point_with_distances(
        &self,
        center: DVec3,
        max_distance: f64,
        filter: Option<&PointFilter<'_, K>>,
        out: &mut Vec<(K, DVec3, f64)>,
    ) {
        if self.cube.loose.distance_squared_to(center) > max_distance * max_distance {
            return;
        }
        for (key, position) in &self.own {
            if filter.is_some_and(|f| !f(key, position)) {
                continue;
            }
            let d2 = (*position - center).length_squared();
            if d2 <= max_distance * max_distance {
                out.push((*key, *position, d2));
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.collect_nearby_point_with_distances(center, max_distance, filter, out);
            }
        }
    }

    /// Points within `max_distance` of the infinite line through `ray`
    /// (perpendicular distance; the direction must be unit length). The
    /// node prune is a slab test against the cube expanded by the radius.
    pub(crate) fn collect_nearby_ray(
        &self,
        ray: &Ray3,
        max_distance: f64,
        filter: Option<&PointFilter<'_, K>>,
        out: &mut Vec<K>,
    ) {
        if self
            .cube
            .loose
            .expanded_by(max_distance)
            .intersect_ray(ray)
            .is_none()
        {
            return;
        }
        for (key, position) in &self.own {
            if filter.is_some_and(|f| !f(key, position)) {
                continue;
            }
            if ray.distance_squared_to_point(*position) <= max_distance * max_distance {
                out.push(*key);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.collect_nearby_ray(ray, max_distance, filter, out);
            }
        }
    }

    /// Unbounded nearest-to-line search used by the view-direction helper.
    pub(crate) fn closest_to_ray(
        &self,
        ray: &Ray3,
        filter: Option<&PointFilter<'_, K>>,
        best: &mut Option<(K, DVec3, f64)>,
    ) {
        for (key, position) in &self.own {
            if filter.is_some_and(|f| !f(key, position)) {
                continue;
            }
            let d2 = ray.distance_squared_to_point(*position);
            if best.as_ref().map_or(true, |&(_, _, bd)| d2 < bd) {
                *best = Some((*key, *position, d2));
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.closest_to_ray(ray, filter, best);
            }
        }
    }

    pub(crate) fn best_match(
        &self,
        fitness: &dyn Fn(&K, &DVec3) -> Option<f64>,
        node_filter: &dyn Fn(&LooseCube) -> bool,
        entry_filter: Option<&PointFilter<'_, K>>,
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
        for (key, position) in &self.own {
            if entry_filter.is_some_and(|f| !f(key, position)) {
                continue;
            }
            if let Some(score) = fitness(key, position) {
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

    pub(crate) fn for_each(&self, visit: &mut dyn FnMut(&K, &DVec3)) {
        for (key, position) in &self.own {
            visit(key, position);
        }
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.for_each(visit);
            }
        }
    }

    pub(crate) fn visit_cubes(&self, depth: usize, visit: &mut dyn FnMut(&LooseCube, usize)) {
        visit(&self.cube, depth);
        if let Some(children) = &self.children {
            for child in children.iter().flatten() {
                child.visit_cubes(depth + 1, visit);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self, config: &OctreeConfig, is_root: bool) -> usize {
        for (key, position) in &self.own {
            assert!(
                self.cube.loose.contains_point(*position),
                "point {key:?} outside its node's loose cube"
            );
            assert!(
                is_root || self.cube.contains_point(*position),
                "point {key:?} outside its node's strict cube"
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

#[cfg(test)]
mod tests {
    use super::*;

    const CFG: OctreeConfig = OctreeConfig {
        looseness: 1.0,
        min_node_size: 0.5,
    };

    #[test]
    fn split_moves_every_point_down() {
        let mut node: PointNode<u32> = PointNode::new(DVec3::ZERO, 8.0, &CFG);
        for i in 0..9u32 {
            let p = DVec3::new(f64::from(i) * 0.8 - 3.2, 1.0, -1.0);
            assert!(node.add(i, p, &CFG));
        }
        assert!(node.has_children());
        assert!(node.own.is_empty(), "points always fit a child octant");
        assert_eq!(node.count(), 9);
        node.check_invariants(&CFG, true);
    }

    #[test]
    fn summary_descends_straight_to_the_holder() {
        let mut node: PointNode<u32> = PointNode::new(DVec3::ZERO, 8.0, &CFG);
        for i in 0..9u32 {
            let p = DVec3::new(f64::from(i) * 0.8 - 3.2, 1.0, -1.0);
            assert!(node.add(i, p, &CFG));
        }
        assert_eq!(node.get(&3), Some(DVec3::new(-0.8, 1.0, -1.0)));
        assert!(node.remove(3, false, &CFG));
        assert!(!node.contains(&3));
        assert_eq!(node.get(&3), None);
        assert_eq!(node.count(), 8);
        node.check_invariants(&CFG, true);
    }

    #[test]
    fn add_rejects_points_outside_the_cube() {
        let mut node: PointNode<u32> = PointNode::new(DVec3::ZERO, 8.0, &CFG);
        assert!(!node.add(0, DVec3::new(4.1, 0.0, 0.0), &CFG));
        assert!(node.add(0, DVec3::new(4.0, 0.0, 0.0), &CFG));
        assert_eq!(node.count(), 1);
    }
}
