//! End-to-end reconstruction pipeline.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assembly::{assemble_mesh, assemble_mesh_parallel};
use crate::error::{ReconstructError, ReconstructResult};
use crate::field::{evaluate_field, evaluate_field_parallel, DistanceField, PointCloudDistance};
use crate::grid::{GridBuilder, GridExtent, SparseGrid};
use crate::mesh::Mesh;
use crate::params::ReconstructParams;
use crate::pointcloud::PointCloud;
use crate::polygonize::{MarchingCubes, Polygonizer};

/// Statistics from a reconstruction run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconstructionStats {
    /// Number of input points.
    pub input_points: usize,
    /// Padded grid dimensions [x, y, z].
    pub grid_dims: [u64; 3],
    /// Cells created.
    pub cells: usize,
    /// Unique query points (shared corners).
    pub query_points: usize,
    /// Query points where the field returned no value.
    pub failed_evaluations: usize,
    /// Vertices in the output mesh.
    pub output_vertices: usize,
    /// Faces in the output mesh.
    pub output_faces: usize,
    /// Time spent building the grid (ms).
    pub grid_time_ms: u64,
    /// Time spent estimating normals and evaluating the field (ms).
    pub field_time_ms: u64,
    /// Time spent polygonizing (ms).
    pub assembly_time_ms: u64,
    /// Total wall time (ms).
    pub total_time_ms: u64,
}

/// Result of [`reconstruct`].
#[derive(Debug, Clone)]
pub struct ReconstructionOutput {
    /// The extracted surface.
    pub mesh: Mesh,
    /// Run statistics.
    pub stats: ReconstructionStats,
    /// The evaluated grid the mesh was extracted from, for inspection with
    /// [`save_grid`](crate::save_grid).
    pub grid: SparseGrid,
}

/// Reconstruct a surface from `cloud` with the point cloud distance field
/// and marching cubes.
///
/// # Errors
///
/// Parameter and input validation errors, [`ReconstructError::GridTooLarge`],
/// and [`ReconstructError::EmptyIsosurface`] when no triangle is produced.
pub fn reconstruct(cloud: &PointCloud, params: &ReconstructParams) -> ReconstructResult<ReconstructionOutput> {
    params.validate()?;
    cloud.validate()?;

    let field_start = Instant::now();
    let field = PointCloudDistance::new(cloud, params.normal_neighbors, params.distance_neighbors)?;
    let normals_ms = field_start.elapsed().as_millis() as u64;
    debug!(normals_ms, "Normals estimated");

    let mut output = reconstruct_with(cloud, params, &field, &MarchingCubes::new(params.iso_level))?;
    output.stats.field_time_ms += normals_ms;
    output.stats.total_time_ms += normals_ms;
    Ok(output)
}

/// Run the pipeline with a caller-supplied field and polygonizer.
///
/// `params.iso_level` and the neighbour counts are not used here; they
/// belong to the collaborators.
pub fn reconstruct_with<F, P>(
    cloud: &PointCloud,
    params: &ReconstructParams,
    field: &F,
    polygonizer: &P,
) -> ReconstructResult<ReconstructionOutput>
where
    F: DistanceField + Sync + ?Sized,
    P: Polygonizer + Sync + ?Sized,
{
    let total_start = Instant::now();
    params.validate()?;
    cloud.validate()?;

    info!(
        points = cloud.len(),
        voxel_size = params.voxel_size,
        padding_voxels = params.padding_voxels,
        "Starting reconstruction"
    );

    // Bounds are frozen from here on: the cloud is borrowed immutably.
    let extent = GridExtent::new(cloud.bounds(), params.voxel_size, params.padding_voxels)?;
    let grid_dims = extent.axis_counts();

    let grid_start = Instant::now();
    let mut builder = GridBuilder::new(extent);
    builder.insert_points(cloud.points())?;
    let mut grid = builder.finish();
    let grid_time_ms = grid_start.elapsed().as_millis() as u64;

    let field_stats = if params.parallel_field {
        evaluate_field_parallel(grid.query_points_mut(), field)
    } else {
        evaluate_field(grid.query_points_mut(), field)
    };

    let assembly_start = Instant::now();
    let mut mesh = Mesh::with_capacity(grid.query_point_count(), grid.cell_count());
    let assembly_stats = if params.parallel_assembly {
        assemble_mesh_parallel(&grid, polygonizer, &mut mesh)?
    } else {
        assemble_mesh(&grid, polygonizer, &mut mesh)?
    };
    let assembly_time_ms = assembly_start.elapsed().as_millis() as u64;
    debug_assert_eq!(assembly_stats.vertices as usize, mesh.vertex_count());

    if mesh.faces.is_empty() {
        warn!(cells = grid.cell_count(), "No triangles extracted");
        return Err(ReconstructError::EmptyIsosurface);
    }

    let stats = ReconstructionStats {
        input_points: cloud.len(),
        grid_dims,
        cells: grid.cell_count(),
        query_points: grid.query_point_count(),
        failed_evaluations: field_stats.failed,
        output_vertices: mesh.vertex_count(),
        output_faces: mesh.face_count(),
        grid_time_ms,
        field_time_ms: field_stats.time_ms,
        assembly_time_ms,
        total_time_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        cells = stats.cells,
        query_points = stats.query_points,
        vertices = stats.output_vertices,
        faces = stats.output_faces,
        total_time_ms = stats.total_time_ms,
        "Reconstruction complete"
    );

    Ok(ReconstructionOutput { mesh, stats, grid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

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

    #[test]
    fn test_reconstruct_sphere() {
        let cloud = sphere_cloud(1500, 5.0);
        let params = ReconstructParams::with_voxel_size(0.5);
        let out = reconstruct(&cloud, &params).unwrap();

        assert!(out.stats.output_faces > 100);
        assert_eq!(out.stats.input_points, 1500);
        assert!(out.stats.query_points < out.stats.cells * 8);
        assert_eq!(out.grid.cell_count(), out.stats.cells);
        assert_eq!(out.grid.query_point_count(), out.stats.query_points);

        let mean_radius = out
            .mesh
            .vertices
            .iter()
            .map(|v| v.position.coords.norm())
            .sum::<f64>()
            / out.mesh.vertex_count() as f64;
        assert!((mean_radius - 5.0).abs() < 0.3, "mean radius {}", mean_radius);
    }

    #[test]
    fn test_exact_field_parallel_matches_sequential() {
        let cloud = sphere_cloud(600, 3.0);
        let sphere = |p: &Point3<f64>| Some(p.coords.norm() - 3.0);
        let mc = MarchingCubes::default();

        let seq = reconstruct_with(&cloud, &ReconstructParams::with_voxel_size(0.4), &sphere, &mc).unwrap();
        let par = reconstruct_with(
            &cloud,
            &ReconstructParams::with_voxel_size(0.4).with_parallel(),
            &sphere,
            &mc,
        )
        .unwrap();

        assert_eq!(seq.mesh.faces, par.mesh.faces);
        assert_eq!(seq.stats.cells, par.stats.cells);
        assert_eq!(seq.stats.query_points, par.stats.query_points);
    }

    #[test]
    fn test_exact_sphere_is_outward_facing() {
        let cloud = sphere_cloud(1500, 5.0);
        let sphere = |p: &Point3<f64>| Some(p.coords.norm() - 5.0);
        let out = reconstruct_with(
            &cloud,
            &ReconstructParams::with_voxel_size(0.5),
            &sphere,
            &MarchingCubes::default(),
        )
        .unwrap();

        let expected = 4.0 / 3.0 * std::f64::consts::PI * 125.0;
        let volume = out.mesh.signed_volume();
        assert!((volume - expected).abs() < 0.05 * expected, "volume {}", volume);

        let outward = out
            .mesh
            .vertices
            .iter()
            .filter_map(|v| v.normal.map(|n| n.dot(&v.position.coords.normalize())))
            .filter(|&d| d > 0.9)
            .count();
        assert!(outward * 10 >= out.mesh.vertex_count() * 9, "{} outward", outward);
    }

    #[test]
    fn test_planar_cloud_reconstructs() {
        let cloud: PointCloud = (0..30)
            .flat_map(|i| (0..30).map(move |j| Point3::new(i as f64 * 0.5, j as f64 * 0.5, 0.0)))
            .collect();
        let out = reconstruct(&cloud, &ReconstructParams::with_voxel_size(1.0)).unwrap();
        assert!(out.stats.output_faces > 0);
    }

    #[test]
    fn test_duplicate_points_do_not_panic() {
        let cloud: PointCloud = std::iter::repeat_n(Point3::new(0.5, 0.5, 0.5), 100).collect();
        let result = reconstruct(&cloud, &ReconstructParams::with_voxel_size(0.25));
        assert!(
            matches!(result, Ok(_) | Err(ReconstructError::EmptyIsosurface)),
            "{:?}",
            result.err()
        );
    }

    #[test]
    fn test_empty_isosurface() {
        let cloud = sphere_cloud(100, 1.0);
        let always_outside = |_: &Point3<f64>| Some(1.0);
        let err = reconstruct_with(
            &cloud,
            &ReconstructParams::with_voxel_size(0.5),
            &always_outside,
            &MarchingCubes::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconstructError::EmptyIsosurface));
    }

    #[test]
    fn test_rejects_empty_cloud() {
        let err = reconstruct(&PointCloud::new(), &ReconstructParams::default()).unwrap_err();
        assert!(matches!(err, ReconstructError::EmptyPointCloud));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let cloud = sphere_cloud(10, 1.0);
        let params = ReconstructParams { voxel_size: -1.0, ..Default::default() };
        let err = reconstruct(&cloud, &params).unwrap_err();
        assert!(matches!(err, ReconstructError::InvalidParams { .. }));
    }
}
