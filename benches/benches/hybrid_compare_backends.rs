// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ops::ControlFlow;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_hybrid::{
    Aabb2D, FlatVec, HybridConfig, HybridIndex, PointIndex, RTree, RTreeConfig, RectIndex,
};

const DOMAIN: Aabb2D<f64> = Aabb2D::new(0.0, 0.0, 2000.0, 2000.0);

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// `count` items over the domain; every `rect_every`-th one is a 12x12 box, the rest are points.
fn gen_mixed(count: usize, rect_every: usize) -> Vec<(Aabb2D<f64>, u32)> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|i| {
            let x = rng.next_f64() * 1988.0;
            let y = rng.next_f64() * 1988.0;
            let bbox = if i % rect_every == 0 {
                Aabb2D::<f64>::from_xywh(x, y, 12.0, 12.0)
            } else {
                Aabb2D::from_point(x, y)
            };
            (bbox, i as u32)
        })
        .collect()
}

fn gen_clustered_points(
    n_clusters: usize,
    per_cluster: usize,
    spread: f64,
) -> Vec<(Aabb2D<f64>, u32)> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    for _ in 0..n_clusters {
        let cx = 200.0 + rng.next_f64() * 1600.0;
        let cy = 200.0 + rng.next_f64() * 1600.0;
        for _ in 0..per_cluster {
            let dx = (rng.next_f64() - 0.5) * spread;
            let dy = (rng.next_f64() - 0.5) * spread;
            out.push((Aabb2D::from_point(cx + dx, cy + dy), out.len() as u32));
        }
    }
    out
}

fn count_hits<PI, RI>(idx: &HybridIndex<f64, u32, PI, RI>, query: Aabb2D<f64>) -> usize
where
    PI: PointIndex<f64, u32>,
    RI: RectIndex<f64, u32>,
{
    let mut hits = 0;
    let _ = idx.search(query, |_, _| {
        hits += 1;
        ControlFlow::Continue(())
    });
    hits
}

fn count_rtree_hits(tree: &RTree<f64, u32>, query: Aabb2D<f64>) -> usize {
    let mut hits = 0;
    let _ = tree.search(query, |_, _| {
        hits += 1;
        ControlFlow::Continue(())
    });
    hits
}

fn bench_build_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_query_mixed");
    let query = Aabb2D::<f64>::from_xywh(800.0, 800.0, 400.0, 400.0);
    for &count in &[1024usize, 4096, 16384] {
        let items = gen_mixed(count, 8);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_function(format!("hybrid_n{}", count), |b| {
            b.iter_batched(
                || HybridIndex::<f64, u32>::new(DOMAIN),
                |mut idx| {
                    idx.extend(items.iter().copied());
                    black_box(count_hits(&idx, query));
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hybrid_bulk_n{}", count), |b| {
            b.iter_batched(
                || items.clone(),
                |items| {
                    let idx =
                        HybridIndex::<f64, u32>::bulk_load(DOMAIN, HybridConfig::default(), items)
                            .expect("default config is valid");
                    black_box(count_hits(&idx, query));
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rtree_only_n{}", count), |b| {
            b.iter_batched(
                RTree::<f64, u32>::new,
                |mut tree| {
                    for (bbox, id) in items.iter().copied() {
                        tree.insert(bbox, id);
                    }
                    black_box(count_rtree_hits(&tree, query));
                },
                BatchSize::SmallInput,
            )
        });

        if count <= 4096 {
            group.bench_function(format!("flatvec_n{}", count), |b| {
                b.iter_batched(
                    || {
                        HybridIndex::<f64, u32, FlatVec<f64, u32>, FlatVec<f64, u32>>::from_parts(
                            FlatVec::with_domain(DOMAIN),
                            FlatVec::new(),
                        )
                    },
                    |mut idx| {
                        idx.extend(items.iter().copied());
                        black_box(count_hits(&idx, query));
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }
    group.finish();
}

fn bench_clustered_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_clustered_points");
    let items = gen_clustered_points(32, 256, 80.0);
    let hybrid = {
        let mut idx = HybridIndex::<f64, u32>::new(DOMAIN);
        idx.extend(items.iter().copied());
        idx
    };
    let rtree =
        RTree::bulk_load(RTreeConfig::default(), items.clone()).expect("default config is valid");
    let mut rng = Rng::new(0xBADC_F00D_1234_5678);
    let queries: Vec<_> = (0..64)
        .map(|_| {
            let x = rng.next_f64() * 1900.0;
            let y = rng.next_f64() * 1900.0;
            Aabb2D::<f64>::from_xywh(x, y, 100.0, 100.0)
        })
        .collect();
    group.throughput(Throughput::Elements(queries.len() as u64));

    group.bench_function("hybrid", |b| {
        b.iter(|| {
            let total: usize = queries.iter().map(|q| count_hits(&hybrid, *q)).sum();
            black_box(total)
        });
    });
    group.bench_function("rtree_only", |b| {
        b.iter(|| {
            let total: usize = queries.iter().map(|q| count_rtree_hits(&rtree, *q)).sum();
            black_box(total)
        });
    });
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_churn");
    let items = gen_mixed(4096, 4);
    let mut rng = Rng::new(0xFACE_FEED_CAFE_BABE);
    let moves: Vec<_> = items
        .iter()
        .map(|(bbox, _)| {
            let dx = (rng.next_f64() - 0.5) * 20.0;
            let dy = (rng.next_f64() - 0.5) * 20.0;
            Aabb2D::new(bbox.min_x + dx, bbox.min_y + dy, bbox.max_x + dx, bbox.max_y + dy)
        })
        .collect();
    group.throughput(Throughput::Elements(items.len() as u64));
    group.bench_function("hybrid_replace", |b| {
        b.iter_batched(
            || {
                let mut idx = HybridIndex::<f64, u32>::new(DOMAIN);
                idx.extend(items.iter().copied());
                idx
            },
            |mut idx| {
                for ((old, id), new) in items.iter().zip(&moves) {
                    idx.replace(*old, id, *new, *id);
                }
                black_box(idx);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_build_query, bench_clustered_points, bench_churn);
criterion_main!(benches);
