//! Benchmarks for sparse grid reconstruction.
//!
//! Run with: cargo bench -p mesh-reconstruct
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-reconstruct -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-reconstruct -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_reconstruct::grid::{GridExtent, SparseGrid};
use mesh_reconstruct::{
    MarchingCubes, Mesh, PointCloud, ReconstructParams, assemble_mesh, assemble_mesh_parallel,
    evaluate_field, evaluate_field_parallel, reconstruct,
};
use nalgebra::Point3;

// =============================================================================
// Test Cloud Generation
// =============================================================================

fn sphere_cloud(n: usize, radius: f64) -> PointCloud {
    let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    (0..n)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            Point3::new(r * theta.cos(), y, r * theta.sin()) * radius
        })
        .collect()
}

fn sphere_field(radius: f64) -> impl Fn(&Point3<f64>) -> Option<f64> + Sync {
    move |p: &Point3<f64>| Some(p.coords.norm() - radius)
}

fn evaluated_grid(cloud: &PointCloud, voxel_size: f64) -> SparseGrid {
    let extent = GridExtent::new(cloud.bounds(), voxel_size, 2).unwrap();
    let mut grid = SparseGrid::build(cloud.points(), extent).unwrap();
    evaluate_field(grid.query_points_mut(), &sphere_field(10.0));
    grid
}

// =============================================================================
// Grid Construction
// =============================================================================

fn bench_grid_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("GridBuild");

    for &n in &[1_000usize, 10_000, 50_000] {
        let cloud = sphere_cloud(n, 10.0);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("points", n), &cloud, |b, cloud| {
            b.iter(|| {
                let extent = GridExtent::new(cloud.bounds(), 0.25, 2).unwrap();
                black_box(SparseGrid::build(black_box(cloud.points()), extent).unwrap())
            })
        });
    }

    group.finish();
}

// =============================================================================
// Field Evaluation
// =============================================================================

fn bench_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("FieldEvaluation");
    let cloud = sphere_cloud(20_000, 10.0);
    let extent = GridExtent::new(cloud.bounds(), 0.25, 2).unwrap();
    let grid = SparseGrid::build(cloud.points(), extent).unwrap();
    let field = sphere_field(10.0);
    group.throughput(Throughput::Elements(grid.query_point_count() as u64));

    group.bench_function("sequential", |b| {
        b.iter_batched(
            || grid.clone(),
            |mut g| evaluate_field(g.query_points_mut(), &field),
            criterion::BatchSize::LargeInput,
        )
    });
    group.bench_function("parallel", |b| {
        b.iter_batched(
            || grid.clone(),
            |mut g| evaluate_field_parallel(g.query_points_mut(), &field),
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

// =============================================================================
// Mesh Assembly
// =============================================================================

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("MeshAssembly");
    let cloud = sphere_cloud(20_000, 10.0);
    let grid = evaluated_grid(&cloud, 0.25);
    let mc = MarchingCubes::default();
    group.throughput(Throughput::Elements(grid.cell_count() as u64));

    group.bench_function("sequential", |b| {
        b.iter(|| {
            let mut mesh = Mesh::new();
            assemble_mesh(black_box(&grid), &mc, &mut mesh).unwrap();
            mesh
        })
    });
    group.bench_function("parallel", |b| {
        b.iter(|| {
            let mut mesh = Mesh::new();
            assemble_mesh_parallel(black_box(&grid), &mc, &mut mesh).unwrap();
            mesh
        })
    });

    group.finish();
}

// =============================================================================
// Full Pipeline
// =============================================================================

fn bench_reconstruct(c: &mut Criterion) {
    let mut group = c.benchmark_group("Reconstruct");
    group.sample_size(10); // Normal estimation dominates

    for &n in &[2_000usize, 10_000] {
        let cloud = sphere_cloud(n, 10.0);
        let params = ReconstructParams::with_voxel_size(0.5);
        group.bench_with_input(BenchmarkId::new("sphere", n), &cloud, |b, cloud| {
            b.iter(|| reconstruct(black_box(cloud), &params).unwrap())
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(
    benches,
    bench_grid_build,
    bench_field,
    bench_assembly,
    bench_reconstruct,
);

criterion_main!(benches);
