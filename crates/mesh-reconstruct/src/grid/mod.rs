//! Sparse dual grid with shared corner query points.
//!
//! Cells are created around every input point and addressed through a
//! packed 64-bit key. Each physical corner is stored once in a
//! [`QueryPointStore`] and referenced by id from every cell that touches it,
//! so the distance field is evaluated once per corner and the extracted
//! mesh never duplicates a lattice position.
//!
//! # Example
//!
//! ```
//! use mesh_reconstruct::grid::{GridExtent, SparseGrid};
//! use mesh_reconstruct::BoundingBox;
//! use nalgebra::Point3;
//!
//! let points = vec![Point3::new(0.0, 0.0, 0.0)];
//! let extent = GridExtent::new(&BoundingBox::from_points(&points), 1.0, 2).unwrap();
//! let grid = SparseGrid::build(&points, extent).unwrap();
//!
//! assert_eq!(grid.cell_count(), 8);
//! assert_eq!(grid.query_point_count(), 27);
//! ```

mod builder;
mod cells;
mod extent;
mod query_points;
mod resolver;
pub mod tables;

pub use builder::GridBuilder;
pub use cells::{Cell, SparseVoxelHashGrid};
pub use extent::{DEFAULT_PADDING_VOXELS, GridExtent, HashKey, VoxelCoord};
pub use query_points::{FieldValue, QueryPoint, QueryPointId, QueryPointStore};
pub use resolver::VertexResolver;

use nalgebra::Point3;

use crate::error::ReconstructResult;
use crate::polygonize::CornerSample;

/// A finished grid: the cell set and the query points it references.
#[derive(Debug, Clone)]
pub struct SparseGrid {
    pub(crate) cells: SparseVoxelHashGrid,
    pub(crate) query_points: QueryPointStore,
}

impl SparseGrid {
    /// Build a grid from `points` in order.
    pub fn build(points: &[Point3<f64>], extent: GridExtent) -> ReconstructResult<Self> {
        let mut builder = GridBuilder::new(extent);
        builder.insert_points(points)?;
        Ok(builder.finish())
    }

    #[inline]
    pub fn extent(&self) -> &GridExtent {
        self.cells.extent()
    }

    /// The cell set.
    #[inline]
    pub fn cells(&self) -> &SparseVoxelHashGrid {
        &self.cells
    }

    #[inline]
    pub fn query_points(&self) -> &QueryPointStore {
        &self.query_points
    }

    /// Mutable access for field evaluation. Query points cannot be added or
    /// removed through this handle.
    #[inline]
    pub fn query_points_mut(&mut self) -> &mut QueryPointStore {
        &mut self.query_points
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn query_point_count(&self) -> usize {
        self.query_points.len()
    }

    /// Corner positions and field values of `cell`, in corner order.
    pub fn corner_samples(&self, cell: &Cell) -> [CornerSample; 8] {
        cell.corners().map(|id| {
            let q = self.query_points.get(id);
            CornerSample {
                position: q.position,
                value: q.value.value(),
            }
        })
    }
}
