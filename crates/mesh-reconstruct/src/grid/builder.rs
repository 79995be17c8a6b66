//! Incremental construction of the sparse grid from points.

use nalgebra::Point3;
use tracing::{debug, info};

use crate::error::{ReconstructError, ReconstructResult};

use super::cells::SparseVoxelHashGrid;
use super::extent::{GridExtent, VoxelCoord};
use super::query_points::QueryPointStore;
use super::resolver::VertexResolver;
use super::tables::POINT_NEIGHBOURHOOD;
use super::SparseGrid;

const PROGRESS_INTERVAL: usize = 10_000;

/// Grows the cell set and the query point store together.
///
/// Every point creates the eight cells of the 2x2x2 block whose shared
/// corner region contains it. New cells take existing corners from their
/// neighbours and only allocate query points for corners nobody owns yet.
#[derive(Debug)]
pub struct GridBuilder {
    grid: SparseVoxelHashGrid,
    query_points: QueryPointStore,
    points_ingested: usize,
}

impl GridBuilder {
    pub fn new(extent: GridExtent) -> Self {
        Self {
            grid: SparseVoxelHashGrid::new(extent),
            query_points: QueryPointStore::new(),
            points_ingested: 0,
        }
    }

    /// Ingest one point. Returns the number of cells it created.
    ///
    /// # Errors
    ///
    /// - [`ReconstructError::InvalidCoordinate`] for a non-finite point
    /// - [`ReconstructError::OutsideGridExtent`] if the point lies outside
    ///   the box the extents were sized from
    pub fn insert_point(&mut self, p: &Point3<f64>) -> ReconstructResult<usize> {
        let index = self.points_ingested;
        if !p.coords.iter().all(|c| c.is_finite()) {
            return Err(ReconstructError::InvalidCoordinate {
                index,
                x: p.x,
                y: p.y,
                z: p.z,
            });
        }

        let base = self.grid.extent().voxel_coord(p);
        let mut created = 0;
        for offset in POINT_NEIGHBOURHOOD {
            if self.ensure_cell(base.offset(offset))? {
                created += 1;
            }
        }

        self.points_ingested += 1;
        Ok(created)
    }

    /// Ingest a batch of points in order.
    pub fn insert_points<'a>(
        &mut self,
        points: impl IntoIterator<Item = &'a Point3<f64>>,
    ) -> ReconstructResult<()> {
        for p in points {
            self.insert_point(p)?;
            if self.points_ingested % PROGRESS_INTERVAL == 0 {
                debug!(
                    points = self.points_ingested,
                    cells = self.grid.len(),
                    query_points = self.query_points.len(),
                    "Grid construction progress"
                );
            }
        }
        Ok(())
    }

    /// Create the cell at `coord` if absent, resolving its corners first.
    /// Returns `true` if the cell is new.
    pub fn ensure_cell(&mut self, coord: VoxelCoord) -> ReconstructResult<bool> {
        let query_points = &mut self.query_points;
        self.grid.create_if_absent(coord, |grid| {
            let resolver = VertexResolver::new(grid);
            std::array::from_fn(|corner| {
                resolver
                    .resolve_corner(corner, coord)
                    .unwrap_or_else(|| query_points.push(grid.extent().corner_position(coord, corner)))
            })
        })
    }

    pub fn points_ingested(&self) -> usize {
        self.points_ingested
    }

    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    pub fn query_point_count(&self) -> usize {
        self.query_points.len()
    }

    /// Freeze the structure.
    pub fn finish(self) -> SparseGrid {
        info!(
            points = self.points_ingested,
            cells = self.grid.len(),
            query_points = self.query_points.len(),
            "Sparse grid built"
        );
        SparseGrid {
            cells: self.grid,
            query_points: self.query_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use std::collections::HashSet;

    fn builder_for(points: &[Point3<f64>], voxel_size: f64) -> GridBuilder {
        let bbox = BoundingBox::from_points(points);
        GridBuilder::new(GridExtent::new(&bbox, voxel_size, 2).unwrap())
    }

    #[test]
    fn test_single_point_creates_block() {
        let points = [Point3::new(0.0, 0.0, 0.0)];
        let mut builder = builder_for(&points, 1.0);
        let created = builder.insert_point(&points[0]).unwrap();
        assert_eq!(created, 8);

        let grid = builder.finish();
        assert_eq!(grid.cell_count(), 8);
        // A 2x2x2 block of cells has a 3x3x3 lattice of corners.
        assert_eq!(grid.query_point_count(), 27);
    }

    #[test]
    fn test_single_cell_owns_eight_points() {
        let points = [Point3::new(0.0, 0.0, 0.0)];
        let mut builder = builder_for(&points, 1.0);
        assert!(builder.ensure_cell(VoxelCoord::new(0, 0, 0)).unwrap());
        assert!(!builder.ensure_cell(VoxelCoord::new(0, 0, 0)).unwrap());
        assert_eq!(builder.cell_count(), 1);
        assert_eq!(builder.query_point_count(), 8);
    }

    #[test]
    fn test_points_in_same_voxel_add_nothing() {
        let points = [Point3::new(0.1, 0.1, 0.1), Point3::new(0.4, 0.2, 0.3)];
        let bbox = BoundingBox::from_points(&[Point3::origin(), Point3::new(1.0, 1.0, 1.0)]);
        let mut builder = GridBuilder::new(GridExtent::new(&bbox, 1.0, 2).unwrap());
        assert_eq!(builder.insert_point(&points[0]).unwrap(), 8);
        assert_eq!(builder.insert_point(&points[1]).unwrap(), 0);
        assert_eq!(builder.cell_count(), 8);
        assert_eq!(builder.query_point_count(), 27);
    }

    #[test]
    fn test_adjacent_points_share_corners() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let mut builder = builder_for(&points, 1.0);
        builder.insert_points(&points).unwrap();
        // Two overlapping 2x2x2 blocks: 3x2x2 cells, 4x3x3 corners.
        assert_eq!(builder.cell_count(), 12);
        assert_eq!(builder.query_point_count(), 36);
    }

    #[test]
    fn test_existing_cells_keep_their_corners() {
        let points: Vec<_> = (0..60)
            .map(|i| {
                let t = i as f64 * 0.21;
                Point3::new(t.cos() * 2.0, t.sin() * 2.0, (t * 0.5).sin())
            })
            .collect();
        let mut builder = builder_for(&points, 0.4);
        builder.insert_points(&points[..10]).unwrap();

        let early_cells: Vec<_> = builder.grid.iter().cloned().collect();
        let early_positions: Vec<_> = builder.query_points.iter().map(|q| q.position).collect();

        builder.insert_points(&points[10..]).unwrap();
        assert!(builder.cell_count() > early_cells.len());
        assert_eq!(&builder.grid.cells()[..early_cells.len()], &early_cells[..]);

        for cell in &early_cells {
            let now = builder.grid.find(cell.coord()).unwrap();
            assert_eq!(now.corners(), cell.corners());
        }
        for (id, position) in early_positions.iter().enumerate() {
            assert_eq!(&builder.query_points.iter().nth(id).unwrap().position, position);
        }
    }

    #[test]
    fn test_corner_positions_are_unique() {
        let points: Vec<_> = (0..20)
            .map(|i| {
                let t = i as f64 * 0.37;
                Point3::new(t.sin() * 3.0, t.cos() * 3.0, t * 0.2)
            })
            .collect();
        let mut builder = builder_for(&points, 0.5);
        builder.insert_points(&points).unwrap();
        let grid = builder.finish();

        // Snap to the half-voxel lattice so rounding cannot hide duplicates.
        let origin = grid.extent().origin();
        let half = grid.extent().voxel_size() / 2.0;
        let positions: HashSet<[i64; 3]> = grid
            .query_points()
            .iter()
            .map(|q| {
                let rel = (q.position - origin) / half;
                [rel.x.round() as i64, rel.y.round() as i64, rel.z.round() as i64]
            })
            .collect();
        assert_eq!(positions.len(), grid.query_point_count());
    }

    #[test]
    fn test_rejects_non_finite_point() {
        let points = [Point3::origin(), Point3::new(1.0, 1.0, 1.0)];
        let mut builder = builder_for(&points, 1.0);
        builder.insert_point(&points[0]).unwrap();
        let err = builder
            .insert_point(&Point3::new(f64::NAN, 0.0, 0.0))
            .unwrap_err();
        match err {
            ReconstructError::InvalidCoordinate { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_rejects_point_outside_extent() {
        let points = [Point3::origin(), Point3::new(1.0, 1.0, 1.0)];
        let mut builder = builder_for(&points, 1.0);
        let err = builder.insert_point(&Point3::new(50.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ReconstructError::OutsideGridExtent { .. }));
    }
}
