//! Padded grid extents and the packed cell key.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReconstructError, ReconstructResult};
use crate::types::BoundingBox;

use super::tables::CORNER_SIGNS;

/// Default margin, in voxels, added on every side of the bounding box.
pub const DEFAULT_PADDING_VOXELS: u32 = 2;

/// Integer address of a cell in the padded grid.
///
/// Derived from a world position by `floor((pos - bbox.min) / voxel_size)`.
/// Components may be slightly negative for cells created at the border of
/// the cloud; the padding absorbs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl VoxelCoord {
    /// Create a coordinate from its components.
    #[inline]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Coordinate displaced by `d` cells along each axis.
    #[inline]
    pub const fn offset(self, d: [i64; 3]) -> Self {
        Self {
            x: self.x + d[0],
            y: self.y + d[1],
            z: self.z + d[2],
        }
    }
}

/// A [`VoxelCoord`] packed into a single integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashKey(u64);

impl HashKey {
    /// Raw packed value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Voxel grid dimensions derived once from a frozen bounding box.
///
/// Every axis is padded by `padding` voxels on both sides plus one extra
/// index for the cells created one step beyond the last point. Keys are
/// packed with a single stride (`max_index`) sized against the largest
/// padded axis, so two coordinates inside the extents never share a key.
#[derive(Debug, Clone, PartialEq)]
pub struct GridExtent {
    origin: Point3<f64>,
    voxel_size: f64,
    padding: u64,
    axis_counts: [u64; 3],
    max_index: u64,
}

impl GridExtent {
    /// Size the grid for `bbox` at the given voxel size.
    ///
    /// # Errors
    ///
    /// - [`ReconstructError::InvalidParams`] if `voxel_size` is not a positive
    ///   finite number or `padding_voxels` is zero
    /// - [`ReconstructError::EmptyPointCloud`] if the box never saw a point
    /// - [`ReconstructError::GridTooLarge`] if the packed key space does not
    ///   fit in 64 bits
    pub fn new(bbox: &BoundingBox, voxel_size: f64, padding_voxels: u32) -> ReconstructResult<Self> {
        if !voxel_size.is_finite() || voxel_size <= 0.0 {
            return Err(ReconstructError::invalid_param(
                "voxel_size",
                voxel_size,
                "voxel size must be a positive finite number",
            ));
        }
        if padding_voxels == 0 {
            return Err(ReconstructError::invalid_param(
                "padding_voxels",
                padding_voxels,
                "padding must be at least one voxel",
            ));
        }
        if bbox.is_empty() {
            return Err(ReconstructError::EmptyPointCloud);
        }

        let extents = bbox.extents();
        if !extents.iter().all(|e| e.is_finite()) || !bbox.min().coords.iter().all(|c| c.is_finite()) {
            return Err(ReconstructError::invalid_params(
                "bounding box has non-finite corners",
            ));
        }

        let padding = padding_voxels as u64;
        let margin = 2 * padding + 1;
        let too_large = |dims: [u64; 3]| ReconstructError::GridTooLarge { dims, voxel_size };

        let raw = |e: f64| (e / voxel_size).ceil();
        let raw_counts = [raw(extents.x), raw(extents.y), raw(extents.z)];
        if raw_counts.iter().any(|&n| n >= u64::MAX as f64 / 2.0) {
            return Err(too_large(raw_counts.map(|n| n as u64)));
        }

        let axis_counts = raw_counts.map(|n| n as u64 + margin);
        let max_index = raw(bbox.largest_extent()) as u64 + margin;

        max_index
            .checked_mul(max_index)
            .and_then(|sq| sq.checked_mul(max_index))
            .ok_or_else(|| too_large(axis_counts))?;

        info!(
            dims = ?axis_counts,
            max_index,
            voxel_size,
            padding_voxels,
            "Grid extents computed"
        );

        Ok(Self {
            origin: bbox.min(),
            voxel_size,
            padding,
            axis_counts,
            max_index,
        })
    }

    /// World position of voxel index (0, 0, 0): the bounding box minimum.
    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Edge length of a cell.
    #[inline]
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Margin in voxels on each side of the bounding box.
    #[inline]
    pub fn padding(&self) -> u64 {
        self.padding
    }

    /// Number of addressable indices per axis, padding included.
    #[inline]
    pub fn axis_counts(&self) -> [u64; 3] {
        self.axis_counts
    }

    /// Packing stride shared by all axes.
    #[inline]
    pub fn max_index(&self) -> u64 {
        self.max_index
    }

    /// Voxel containing `p`.
    #[inline]
    pub fn voxel_coord(&self, p: &Point3<f64>) -> VoxelCoord {
        let rel = (p - self.origin) / self.voxel_size;
        VoxelCoord::new(
            rel.x.floor() as i64,
            rel.y.floor() as i64,
            rel.z.floor() as i64,
        )
    }

    /// Centre of the cell at `coord`.
    #[inline]
    pub fn cell_center(&self, coord: VoxelCoord) -> Point3<f64> {
        self.origin
            + Vector3::new(coord.x as f64, coord.y as f64, coord.z as f64) * self.voxel_size
    }

    /// World position of corner `corner` (0..8) of the cell at `coord`.
    #[inline]
    pub fn corner_position(&self, coord: VoxelCoord, corner: usize) -> Point3<f64> {
        let half = self.voxel_size / 2.0;
        let s = CORNER_SIGNS[corner];
        self.cell_center(coord) + Vector3::new(s[0] as f64, s[1] as f64, s[2] as f64) * half
    }

    /// True if `coord` lies inside the padded extents.
    #[inline]
    pub fn contains(&self, coord: VoxelCoord) -> bool {
        self.shifted(coord).is_some()
    }

    /// Packed key for `coord`, or `None` outside the padded extents.
    #[inline]
    pub fn key(&self, coord: VoxelCoord) -> Option<HashKey> {
        let [x, y, z] = self.shifted(coord)?;
        let key = HashKey((x * self.max_index + y) * self.max_index + z);
        debug_assert_eq!(
            self.coord_of(key),
            coord,
            "cell key packing is not injective for {:?}",
            coord
        );
        Some(key)
    }

    /// Inverse of [`key`](Self::key).
    pub fn coord_of(&self, key: HashKey) -> VoxelCoord {
        let m = self.max_index;
        let p = self.padding as i64;
        let z = key.0 % m;
        let y = (key.0 / m) % m;
        let x = key.0 / (m * m);
        VoxelCoord::new(x as i64 - p, y as i64 - p, z as i64 - p)
    }

    /// Coordinate shifted into `[0, axis_count)` per axis.
    fn shifted(&self, coord: VoxelCoord) -> Option<[u64; 3]> {
        let p = self.padding as i64;
        let shift = |c: i64, count: u64| -> Option<u64> {
            let s = c.checked_add(p)?;
            (s >= 0 && (s as u64) < count).then_some(s as u64)
        };
        Some([
            shift(coord.x, self.axis_counts[0])?,
            shift(coord.y, self.axis_counts[1])?,
            shift(coord.z, self.axis_counts[2])?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(min: [f64; 3], max: [f64; 3]) -> BoundingBox {
        BoundingBox::from_points(&[
            Point3::new(min[0], min[1], min[2]),
            Point3::new(max[0], max[1], max[2]),
        ])
    }

    #[test]
    fn test_extent_dimensions() {
        let extent = GridExtent::new(&bbox([0.0; 3], [10.0, 4.0, 2.5]), 1.0, 2).unwrap();
        // ceil(extent / voxel) + 2 * padding + 1
        assert_eq!(extent.axis_counts(), [15, 9, 8]);
        assert_eq!(extent.max_index(), 15);
        assert_eq!(extent.padding(), 2);
    }

    #[test]
    fn test_rejects_bad_voxel_size() {
        let b = bbox([0.0; 3], [1.0; 3]);
        for vs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = GridExtent::new(&b, vs, 2).unwrap_err();
            assert!(matches!(err, ReconstructError::InvalidParams { .. }));
        }
    }

    #[test]
    fn test_rejects_zero_padding() {
        let err = GridExtent::new(&bbox([0.0; 3], [1.0; 3]), 1.0, 0).unwrap_err();
        assert!(matches!(err, ReconstructError::InvalidParams { .. }));
    }

    #[test]
    fn test_rejects_empty_bbox() {
        let err = GridExtent::new(&BoundingBox::empty(), 1.0, 2).unwrap_err();
        assert!(matches!(err, ReconstructError::EmptyPointCloud));
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let err = GridExtent::new(&bbox([0.0; 3], [1.0e9; 3]), 1.0e-6, 2).unwrap_err();
        assert!(matches!(err, ReconstructError::GridTooLarge { .. }));
    }

    #[test]
    fn test_voxel_coord_and_center() {
        let extent = GridExtent::new(&bbox([-1.0, 0.0, 2.0], [3.0, 4.0, 6.0]), 0.5, 2).unwrap();
        let c = extent.voxel_coord(&Point3::new(0.26, 1.0, 2.0));
        assert_eq!(c, VoxelCoord::new(2, 2, 0));
        assert_eq!(extent.cell_center(c), Point3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_corner_positions_surround_center() {
        let extent = GridExtent::new(&bbox([0.0; 3], [2.0; 3]), 2.0, 1).unwrap();
        let coord = VoxelCoord::new(0, 0, 0);
        assert_eq!(extent.corner_position(coord, 0), Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(extent.corner_position(coord, 6), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(extent.corner_position(coord, 3), Point3::new(-1.0, 1.0, -1.0));
    }

    #[test]
    fn test_key_round_trip_at_boundaries() {
        let extent = GridExtent::new(&bbox([0.0; 3], [3.0, 1.0, 2.0]), 1.0, 2).unwrap();
        let [nx, ny, nz] = extent.axis_counts();
        let lo = -(extent.padding() as i64);
        let corners = [
            VoxelCoord::new(lo, lo, lo),
            VoxelCoord::new(nx as i64 + lo - 1, ny as i64 + lo - 1, nz as i64 + lo - 1),
            VoxelCoord::new(0, ny as i64 + lo - 1, lo),
        ];
        for c in corners {
            let key = extent.key(c).expect("inside extents");
            assert_eq!(extent.coord_of(key), c);
        }
    }

    #[test]
    fn test_key_outside_extent() {
        let extent = GridExtent::new(&bbox([0.0; 3], [3.0; 3]), 1.0, 2).unwrap();
        let [nx, _, _] = extent.axis_counts();
        assert!(extent.key(VoxelCoord::new(-3, 0, 0)).is_none());
        assert!(extent.key(VoxelCoord::new(nx as i64 - 2, 0, 0)).is_none());
        assert!(extent.key(VoxelCoord::new(0, i64::MAX, 0)).is_none());
        assert!(extent.contains(VoxelCoord::new(-2, -2, -2)));
    }

    #[test]
    fn test_keys_are_injective_over_extent() {
        let extent = GridExtent::new(&bbox([0.0; 3], [2.0, 3.0, 1.0]), 1.0, 1).unwrap();
        let [nx, ny, nz] = extent.axis_counts();
        let p = extent.padding() as i64;
        let mut seen = std::collections::HashSet::new();
        for x in -p..nx as i64 - p {
            for y in -p..ny as i64 - p {
                for z in -p..nz as i64 - p {
                    let key = extent.key(VoxelCoord::new(x, y, z)).unwrap();
                    assert!(seen.insert(key), "duplicate key for ({}, {}, {})", x, y, z);
                }
            }
        }
        assert_eq!(seen.len() as u64, nx * ny * nz);
    }
}
