//! Benchmarks for hull construction and OBB search.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use manifold_hull::{find_obb_3d, HullParams, Manifold};
use nalgebra::Point3;

fn scattered_points(n: usize, seed: u64) -> Vec<Point3<f64>> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) * 20.0 - 10.0
    };
    (0..n)
        .map(|_| Point3::new(next(), next(), next()))
        .collect()
}

fn bench_find_convex_hull(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_convex_hull");
    for n in [32usize, 256, 1024] {
        let points = scattered_points(n, 42);
        group.bench_with_input(BenchmarkId::from_parameter(n), &points, |b, points| {
            b.iter(|| {
                let mut hull = Manifold::new();
                hull.find_convex_hull(points, &HullParams::default())
            });
        });
    }
    group.finish();
}

fn bench_obb(c: &mut Criterion) {
    let points = scattered_points(512, 42);
    let mut hull = Manifold::new();
    hull.find_convex_hull(&points, &HullParams::default());

    c.bench_function("find_obb_3d/512", |b| {
        b.iter(|| find_obb_3d(&hull));
    });
}

criterion_group!(benches, bench_find_convex_hull, bench_obb);
criterion_main!(benches);
