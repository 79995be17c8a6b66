//! Corner deduplication against existing neighbour cells.

use super::cells::SparseVoxelHashGrid;
use super::extent::VoxelCoord;
use super::query_points::QueryPointId;
use super::tables::SHARED_CORNERS;

/// Finds a query point already owned by a neighbour for a given corner.
#[derive(Debug, Clone, Copy)]
pub struct VertexResolver<'a> {
    grid: &'a SparseVoxelHashGrid,
}

impl<'a> VertexResolver<'a> {
    pub fn new(grid: &'a SparseVoxelHashGrid) -> Self {
        Self { grid }
    }

    /// Id of corner `corner` of the cell at `coord`, if any of the seven
    /// cells sharing that corner already exists.
    ///
    /// Neighbours are checked in [`SHARED_CORNERS`] order and the first hit
    /// wins. Neighbours outside the grid extents count as absent.
    pub fn resolve_corner(&self, corner: usize, coord: VoxelCoord) -> Option<QueryPointId> {
        SHARED_CORNERS[corner].iter().find_map(|shared| {
            self.grid
                .find(coord.offset(shared.offset))
                .map(|cell| cell.corner(shared.corner))
        })
    }
}
