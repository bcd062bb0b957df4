// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use canopy_geom::{Aabb3D, DVec3};
use canopy_octree::BoundsOctree;

use rstar::primitives::Rectangle;
use rstar::{RTree, AABB};

fn gen_grid_boxes(n: usize, cell: f64) -> Vec<Aabb3D> {
    let mut out = Vec::with_capacity(n * n * n);
    let offset = n as f64 * cell * 0.5;
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let center = DVec3::new(
                    x as f64 * cell - offset,
                    y as f64 * cell - offset,
                    z as f64 * cell - offset,
                );
                out.push(Aabb3D::from_center_size(center, DVec3::splat(cell)));
            }
        }
    }
    out
}

fn to_rstar_boxes(v: &[Aabb3D]) -> Vec<Rectangle<[f64; 3]>> {
    v.iter()
        .map(|b| {
            Rectangle::from_corners([b.min.x, b.min.y, b.min.z], [b.max.x, b.max.y, b.max.z])
        })
        .collect()
}

fn bench_rstar_external_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("rstar_external_compare");
    for &n in &[8usize, 12] {
        let boxes = gen_grid_boxes(n, 10.0);
        let world = n as f64 * 10.0;
        let probe = Aabb3D::from_center_size(DVec3::ZERO, DVec3::splat(world * 0.4));
        group.throughput(Throughput::Elements((n * n * n) as u64));

        group.bench_function(format!("canopy_build_query_n{}", n * n * n), |b| {
            b.iter_batched(
                || boxes.clone(),
                |boxes| {
                    let mut tree = BoundsOctree::new(world, DVec3::ZERO, 1.0, 1.25);
                    for (i, bounds) in boxes.into_iter().enumerate() {
                        tree.add(i as u32, bounds);
                    }
                    let hits = tree.get_intersecting(&probe).len();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_bulk_n{}", n * n * n), |b| {
            b.iter_batched(
                || to_rstar_boxes(&boxes),
                |rects| {
                    let tree = RTree::bulk_load(rects);
                    let envelope = AABB::from_corners(
                        [probe.min.x, probe.min.y, probe.min.z],
                        [probe.max.x, probe.max.y, probe.max.z],
                    );
                    let hits = tree.locate_in_envelope_intersecting(&envelope).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rstar_external_compare);
criterion_main!(benches);
