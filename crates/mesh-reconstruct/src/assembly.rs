//! Mesh assembly over all cells of an evaluated grid.
//!
//! Cells are visited in creation order and a single vertex counter is
//! threaded through the polygonizer, so the output is fully determined by
//! the grid. The parallel variant polygonizes cells independently into
//! local buffers and renumbers them with a prefix sum, producing exactly
//! the same vertices and faces.

use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{ReconstructError, ReconstructResult};
use crate::grid::SparseGrid;
use crate::mesh::MeshSink;
use crate::polygonize::{Polygonizer, EDGE_CORNERS};

const PROGRESS_INTERVAL: usize = 1_000;

/// Most vertices one cell can add: one per edge.
const MAX_CELL_VERTICES: u32 = EDGE_CORNERS.len() as u32;

/// Counters collected during assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Cells handed to the polygonizer.
    pub cells_visited: usize,
    /// Cells that produced at least one triangle.
    pub cells_with_geometry: usize,
    /// Vertices emitted; also the final value of the vertex counter.
    pub vertices: u32,
    /// Triangles emitted.
    pub triangles: usize,
}

/// Forwards to an inner sink while counting triangles.
struct Counting<'a, S: ?Sized> {
    inner: &'a mut S,
    triangles: usize,
}

impl<S: MeshSink + ?Sized> MeshSink for Counting<'_, S> {
    fn add_vertex(&mut self, index: u32, position: Point3<f64>) {
        self.inner.add_vertex(index, position);
    }

    fn add_triangle(&mut self, face: [u32; 3]) {
        self.triangles += 1;
        self.inner.add_triangle(face);
    }
}

/// Polygonize every cell in creation order into `sink`, then finalize it.
///
/// # Errors
///
/// [`ReconstructError::MeshTooLarge`] when the next cell could push the
/// vertex counter past `u32::MAX`. Vertices already added stay in `sink`.
pub fn assemble_mesh<P, S>(
    grid: &SparseGrid,
    polygonizer: &P,
    sink: &mut S,
) -> ReconstructResult<AssemblyStats>
where
    P: Polygonizer + ?Sized,
    S: MeshSink + ?Sized,
{
    let mut stats = AssemblyStats::default();
    let mut counting = Counting {
        inner: sink,
        triangles: 0,
    };
    let mut next_vertex = 0u32;

    for (i, cell) in grid.cells().iter().enumerate() {
        if i % PROGRESS_INTERVAL == 0 {
            debug!(cell = i, total = grid.cell_count(), "Mesh assembly progress");
        }

        if next_vertex.checked_add(MAX_CELL_VERTICES).is_none() {
            return Err(ReconstructError::MeshTooLarge {
                vertices: u64::from(next_vertex) + u64::from(MAX_CELL_VERTICES),
            });
        }

        let before = counting.triangles;
        next_vertex = polygonizer.polygonize(&grid.corner_samples(cell), next_vertex, &mut counting);

        stats.cells_visited += 1;
        if counting.triangles > before {
            stats.cells_with_geometry += 1;
        }
    }

    stats.vertices = next_vertex;
    stats.triangles = counting.triangles;
    counting.inner.finalize();

    info!(
        cells = stats.cells_visited,
        vertices = stats.vertices,
        triangles = stats.triangles,
        "Mesh assembled"
    );
    Ok(stats)
}

/// Per-cell output with indices relative to the cell's first vertex.
#[derive(Debug, Default)]
struct CellBuffer {
    positions: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
}

impl MeshSink for CellBuffer {
    fn add_vertex(&mut self, index: u32, position: Point3<f64>) {
        debug_assert_eq!(index as usize, self.positions.len());
        self.positions.push(position);
    }

    fn add_triangle(&mut self, face: [u32; 3]) {
        self.faces.push(face);
    }
}

/// First vertex index of each buffer and the total vertex count.
fn vertex_offsets(counts: impl IntoIterator<Item = usize>) -> ReconstructResult<(Vec<u32>, u32)> {
    let mut offsets = Vec::new();
    let mut total = 0u64;
    for count in counts {
        offsets.push(total);
        total += count as u64;
    }

    let too_large = || ReconstructError::MeshTooLarge { vertices: total };
    let total = u32::try_from(total).map_err(|_| too_large())?;
    // Every offset is at most the total, which fits.
    let offsets = offsets.into_iter().map(|o| o as u32).collect();
    Ok((offsets, total))
}

/// Same output as [`assemble_mesh`], with cells polygonized on the rayon pool.
///
/// # Errors
///
/// [`ReconstructError::MeshTooLarge`] when the cells hold more vertices
/// than `u32` indices can number. Nothing is added to `sink` in that case.
pub fn assemble_mesh_parallel<P, S>(
    grid: &SparseGrid,
    polygonizer: &P,
    sink: &mut S,
) -> ReconstructResult<AssemblyStats>
where
    P: Polygonizer + Sync + ?Sized,
    S: MeshSink + ?Sized,
{
    let buffers: Vec<CellBuffer> = grid
        .cells()
        .cells()
        .par_iter()
        .map(|cell| {
            let mut buffer = CellBuffer::default();
            polygonizer.polygonize(&grid.corner_samples(cell), 0, &mut buffer);
            buffer
        })
        .collect();

    let (offsets, total) = vertex_offsets(buffers.iter().map(|b| b.positions.len()))?;
    let mut stats = AssemblyStats::default();

    for (buffer, &offset) in buffers.iter().zip(&offsets) {
        for (i, p) in buffer.positions.iter().enumerate() {
            sink.add_vertex(offset + i as u32, *p);
        }
        for face in &buffer.faces {
            sink.add_triangle(face.map(|v| v + offset));
        }

        stats.cells_visited += 1;
        if !buffer.faces.is_empty() {
            stats.cells_with_geometry += 1;
        }
        stats.triangles += buffer.faces.len();
    }

    stats.vertices = total;
    sink.finalize();

    info!(
        cells = stats.cells_visited,
        vertices = stats.vertices,
        triangles = stats.triangles,
        "Mesh assembled (parallel)"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{evaluate_field, DistanceField};
    use crate::grid::{GridExtent, SparseGrid};
    use crate::mesh::Mesh;
    use crate::polygonize::MarchingCubes;
    use crate::types::BoundingBox;

    struct Sphere {
        radius: f64,
    }

    impl DistanceField for Sphere {
        fn distance(&self, p: &Point3<f64>) -> Option<f64> {
            Some(p.coords.norm() - self.radius)
        }
    }

    fn sphere_grid() -> SparseGrid {
        let points: Vec<_> = (0..400)
            .map(|i| {
                // Fibonacci sphere
                let n = 400.0;
                let k = i as f64 + 0.5;
                let phi = (1.0 - 2.0 * k / n).acos();
                let theta = std::f64::consts::PI * (1.0 + 5f64.sqrt()) * k;
                Point3::new(
                    2.0 * phi.sin() * theta.cos(),
                    2.0 * phi.sin() * theta.sin(),
                    2.0 * phi.cos(),
                )
            })
            .collect();
        let extent = GridExtent::new(&BoundingBox::from_points(&points), 0.5, 2).unwrap();
        let mut grid = SparseGrid::build(&points, extent).unwrap();
        evaluate_field(grid.query_points_mut(), &Sphere { radius: 2.0 });
        grid
    }

    #[test]
    fn test_assembly_produces_surface() {
        let grid = sphere_grid();
        let mut mesh = Mesh::new();
        let stats = assemble_mesh(&grid, &MarchingCubes::default(), &mut mesh).unwrap();

        assert!(stats.triangles > 0);
        assert_eq!(stats.vertices as usize, mesh.vertex_count());
        assert_eq!(stats.triangles, mesh.face_count());
        assert_eq!(stats.cells_visited, grid.cell_count());
        for face in &mesh.faces {
            assert!(face.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        }
        // Vertices sit near the sphere.
        for v in &mesh.vertices {
            assert!((v.position.coords.norm() - 2.0).abs() < 0.5);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let grid = sphere_grid();
        let mc = MarchingCubes::default();

        let mut seq = Mesh::new();
        let seq_stats = assemble_mesh(&grid, &mc, &mut seq).unwrap();
        let mut par = Mesh::new();
        let par_stats = assemble_mesh_parallel(&grid, &mc, &mut par).unwrap();

        assert_eq!(seq_stats, par_stats);
        assert_eq!(seq.faces, par.faces);
        let seq_pos: Vec<_> = seq.vertices.iter().map(|v| v.position).collect();
        let par_pos: Vec<_> = par.vertices.iter().map(|v| v.position).collect();
        assert_eq!(seq_pos, par_pos);
    }

    #[test]
    fn test_unevaluated_grid_is_empty() {
        let points = vec![Point3::origin()];
        let extent = GridExtent::new(&BoundingBox::from_points(&points), 1.0, 2).unwrap();
        let grid = SparseGrid::build(&points, extent).unwrap();
        let mut mesh = Mesh::new();
        let stats = assemble_mesh(&grid, &MarchingCubes::default(), &mut mesh).unwrap();
        assert_eq!(stats.cells_visited, 8);
        assert_eq!(stats.triangles, 0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_vertex_offsets_prefix_sum() {
        let (offsets, total) = vertex_offsets([3, 0, 5, 1]).unwrap();
        assert_eq!(offsets, vec![0, 3, 3, 8]);
        assert_eq!(total, 9);
    }

    #[test]
    fn test_vertex_offsets_overflow() {
        let err = vertex_offsets([u32::MAX as usize, 1]).unwrap_err();
        match err {
            ReconstructError::MeshTooLarge { vertices } => {
                assert_eq!(vertices, u64::from(u32::MAX) + 1)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(vertex_offsets([u32::MAX as usize]).is_ok());
    }
}
