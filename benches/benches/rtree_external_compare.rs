// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use core::ops::ControlFlow;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_hybrid::{Aabb2D, HybridIndex, RTreeConfig, RTreeF64, RectIndex};

use rstar::primitives::Rectangle;
use rstar::{AABB, RTree};

fn gen_grid_rects(n: usize, cell: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push(Aabb2D::<f64>::from_xywh(x0, y0, cell, cell));
        }
    }
    out
}

fn to_rstar_rects(v: &[Aabb2D<f64>]) -> Vec<Rectangle<[f64; 2]>> {
    v.iter()
        .map(|r| Rectangle::from_corners([r.min_x, r.min_y], [r.max_x, r.max_y]))
        .collect()
}

fn count_hits(tree: &RTreeF64<u32>, query: Aabb2D<f64>) -> usize {
    let mut hits = 0;
    let _ = tree.search(query, |_, _| {
        hits += 1;
        ControlFlow::Continue(())
    });
    hits
}

fn bench_rtree_external_compare_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_compare_f64");
    for &n in &[64usize, 128] {
        let rects = gen_grid_rects(n, 10.0);
        let aabb_query = Aabb2D::<f64>::from_xywh(100.0, 100.0, 400.0, 400.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("understory_build_query_n{}", n), |b| {
            b.iter_batched(
                RTreeF64::<u32>::new,
                |mut tree| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        tree.insert(r, i as u32);
                    }
                    black_box(count_hits(&tree, aabb_query));
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("understory_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || {
                    let entries: Vec<_> = rects
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, r)| (r, i as u32))
                        .collect();
                    entries
                },
                |entries| {
                    let tree = RTreeF64::bulk_load(RTreeConfig::default(), entries)
                        .expect("default config is valid");
                    black_box(count_hits(&tree, aabb_query));
                },
                BatchSize::SmallInput,
            )
        });

        // Same boxes as points at their min corners, through the hybrid.
        group.bench_function(format!("understory_hybrid_points_n{}", n), |b| {
            let domain = Aabb2D::new(0.0, 0.0, n as f64 * 10.0, n as f64 * 10.0);
            b.iter_batched(
                || HybridIndex::<f64, u32>::new(domain),
                |mut idx| {
                    for (i, r) in rects.iter().enumerate() {
                        idx.insert(Aabb2D::from_point(r.min_x, r.min_y), i as u32);
                    }
                    let mut hits = 0_usize;
                    let _ = idx.search(aabb_query, |_, _| {
                        hits += 1;
                        ControlFlow::Continue(())
                    });
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_rects(&rects),
                |rectangles| {
                    let tree = RTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(
                        [aabb_query.min_x, aabb_query.min_y],
                        [aabb_query.max_x, aabb_query.max_y],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rtree_external_compare_f64);
criterion_main!(benches);
