// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use canopy_geom::{Aabb3D, DVec3, Ray3};
use canopy_octree::{BoundsOctree, PointOctree};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

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
                out.push(Aabb3D::from_center_size(center, DVec3::splat(cell * 0.8)));
            }
        }
    }
    out
}

fn gen_random_points(n: usize, extent: f64) -> Vec<DVec3> {
    let mut rng = SmallRng::seed_from_u64(0xca11ab1e);
    (0..n)
        .map(|_| {
            DVec3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            )
        })
        .collect()
}

fn bench_bounds_build_and_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounds_build_query");
    for &n in &[8usize, 16] {
        let boxes = gen_grid_boxes(n, 4.0);
        let world = n as f64 * 4.0;
        let probe = Aabb3D::from_center_size(DVec3::ZERO, DVec3::splat(world * 0.25));
        group.throughput(Throughput::Elements((n * n * n) as u64));

        group.bench_function(format!("build_query_n{}", n * n * n), |b| {
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

        group.bench_function(format!("query_only_n{}", n * n * n), |b| {
            let mut tree = BoundsOctree::new(world, DVec3::ZERO, 1.0, 1.25);
            for (i, bounds) in boxes.iter().enumerate() {
                tree.add(i as u32, *bounds);
            }
            b.iter(|| {
                let hits = tree.get_intersecting(black_box(&probe)).len();
                black_box(hits);
            })
        });

        group.bench_function(format!("raycast_n{}", n * n * n), |b| {
            let mut tree = BoundsOctree::new(world, DVec3::ZERO, 1.0, 1.25);
            for (i, bounds) in boxes.iter().enumerate() {
                tree.add(i as u32, *bounds);
            }
            let ray = Ray3::new(DVec3::new(-world, 0.1, 0.1), DVec3::X);
            b.iter(|| {
                let hits = tree.raycast_all(black_box(&ray), world * 3.0).len();
                black_box(hits);
            })
        });
    }
    group.finish();
}

fn bench_bounds_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounds_churn");
    let boxes = gen_grid_boxes(8, 4.0);
    group.throughput(Throughput::Elements(boxes.len() as u64));
    group.bench_function("move_all_entries", |b| {
        b.iter_batched(
            || {
                let mut tree = BoundsOctree::new(64.0, DVec3::ZERO, 1.0, 1.25);
                for (i, bounds) in boxes.iter().enumerate() {
                    tree.add(i as u32, *bounds);
                }
                tree
            },
            |mut tree| {
                for (i, bounds) in boxes.iter().enumerate() {
                    let shifted = Aabb3D::from_center_size(
                        bounds.center() + DVec3::splat(1.3),
                        bounds.size(),
                    );
                    tree.move_entry(i as u32, shifted);
                }
                black_box(tree.len());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_point_nearby(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_nearby");
    for &n in &[1_000usize, 10_000] {
        let points = gen_random_points(n, 50.0);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_function(format!("radius_query_n{n}"), |b| {
            let mut tree = PointOctree::new(100.0, DVec3::ZERO, 0.5);
            for (i, p) in points.iter().enumerate() {
                tree.add(i as u32, *p);
            }
            b.iter(|| {
                let hits = tree.get_nearby(black_box(DVec3::ZERO), 10.0).len();
                black_box(hits);
            })
        });

        group.bench_function(format!("linear_scan_n{n}"), |b| {
            b.iter(|| {
                let hits = points
                    .iter()
                    .filter(|p| p.length_squared() <= 100.0)
                    .count();
                black_box(hits);
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_bounds_build_and_query,
    bench_bounds_churn,
    bench_point_nearby
);
criterion_main!(benches);
