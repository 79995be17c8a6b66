//! Hash-addressed storage for dual grid cells.

use hashbrown::HashMap;

use crate::error::{ReconstructError, ReconstructResult};

use super::extent::{GridExtent, HashKey, VoxelCoord};
use super::query_points::QueryPointId;

/// A cell of the dual grid with all eight corners resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    coord: VoxelCoord,
    corners: [QueryPointId; 8],
}

impl Cell {
    #[inline]
    pub fn coord(&self) -> VoxelCoord {
        self.coord
    }

    /// Query point ids in marching cubes corner order.
    #[inline]
    pub fn corners(&self) -> &[QueryPointId; 8] {
        &self.corners
    }

    #[inline]
    pub fn corner(&self, index: usize) -> QueryPointId {
        self.corners[index]
    }
}

/// Sparse set of cells keyed by their packed coordinate.
///
/// Cells live in a vector in creation order and the hash map only stores
/// indices into it, so iteration is deterministic for a given insertion
/// sequence regardless of hashing.
#[derive(Debug, Clone)]
pub struct SparseVoxelHashGrid {
    extent: GridExtent,
    index: HashMap<HashKey, usize>,
    cells: Vec<Cell>,
}

impl SparseVoxelHashGrid {
    pub fn new(extent: GridExtent) -> Self {
        Self {
            extent,
            index: HashMap::new(),
            cells: Vec::new(),
        }
    }

    #[inline]
    pub fn extent(&self) -> &GridExtent {
        &self.extent
    }

    /// Cell at `coord`, or `None` if it was never created or lies outside
    /// the extents.
    #[inline]
    pub fn find(&self, coord: VoxelCoord) -> Option<&Cell> {
        let key = self.extent.key(coord)?;
        self.index.get(&key).map(|&i| &self.cells[i])
    }

    #[inline]
    pub fn contains(&self, coord: VoxelCoord) -> bool {
        self.find(coord).is_some()
    }

    /// Create the cell at `coord` unless it already exists.
    ///
    /// `resolve` runs only for a new cell and sees the grid as it was before
    /// the insertion. Returns `true` if a cell was created.
    ///
    /// # Errors
    ///
    /// [`ReconstructError::OutsideGridExtent`] if `coord` cannot be keyed.
    pub fn create_if_absent<F>(&mut self, coord: VoxelCoord, resolve: F) -> ReconstructResult<bool>
    where
        F: FnOnce(&Self) -> [QueryPointId; 8],
    {
        let key = self
            .extent
            .key(coord)
            .ok_or_else(|| ReconstructError::OutsideGridExtent {
                coord,
                dims: self.extent.axis_counts(),
            })?;

        if self.index.contains_key(&key) {
            return Ok(false);
        }

        let corners = resolve(self);
        self.index.insert(key, self.cells.len());
        self.cells.push(Cell { coord, corners });
        Ok(true)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in creation order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Cell> {
        self.cells.iter()
    }
}
