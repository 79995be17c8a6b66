//! Fluent builder API for reconstruction.
//!
//! # Example
//!
//! ```no_run
//! use mesh_reconstruct::{PointCloud, ReconstructBuilder};
//!
//! let cloud = PointCloud::load("scan.xyz").unwrap();
//!
//! let result = ReconstructBuilder::new(&cloud)
//!     .voxel_size(0.5)          // cell edge in input units
//!     .neighbors(12)            // normal and distance neighbourhoods
//!     .parallel(true)
//!     .build()
//!     .unwrap();
//!
//! result.mesh.save("surface.ply").unwrap();
//! ```

use crate::error::ReconstructResult;
use crate::params::ReconstructParams;
use crate::pointcloud::PointCloud;
use crate::reconstruct::{ReconstructionOutput, reconstruct};

/// Fluent builder for surface reconstruction.
///
/// Starts from [`ReconstructParams::default`]; every setter overrides one
/// parameter. Nothing is validated until [`build`](Self::build).
pub struct ReconstructBuilder<'a> {
    cloud: &'a PointCloud,
    params: ReconstructParams,
}

impl<'a> ReconstructBuilder<'a> {
    /// Create a builder for `cloud` with default parameters.
    pub fn new(cloud: &'a PointCloud) -> Self {
        Self {
            cloud,
            params: ReconstructParams::default(),
        }
    }

    /// Start from an existing parameter set, e.g. one loaded from TOML.
    pub fn with_params(mut self, params: ReconstructParams) -> Self {
        self.params = params;
        self
    }

    // =========================================================================
    // Grid
    // =========================================================================

    /// Set the cell edge length.
    ///
    /// Smaller cells follow the surface more closely but create more cells
    /// and query points. A value near the typical point spacing works well.
    pub fn voxel_size(mut self, size: f64) -> Self {
        self.params.voxel_size = size;
        self
    }

    /// Set the margin in voxels around the bounding box.
    pub fn padding(mut self, voxels: u32) -> Self {
        self.params.padding_voxels = voxels;
        self
    }

    // =========================================================================
    // Field and surface
    // =========================================================================

    /// Set the iso level of the extracted surface.
    pub fn iso_level(mut self, level: f64) -> Self {
        self.params.iso_level = level;
        self
    }

    /// Neighbours used for normal estimation.
    pub fn normal_neighbors(mut self, k: usize) -> Self {
        self.params.normal_neighbors = k;
        self
    }

    /// Neighbours averaged per distance query.
    pub fn distance_neighbors(mut self, k: usize) -> Self {
        self.params.distance_neighbors = k;
        self
    }

    /// Set both neighbourhood sizes.
    pub fn neighbors(self, k: usize) -> Self {
        self.normal_neighbors(k).distance_neighbors(k)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run field evaluation and assembly on the rayon pool.
    ///
    /// The resulting mesh is identical to a sequential run.
    pub fn parallel(mut self, enable: bool) -> Self {
        self.params.parallel_field = enable;
        self.params.parallel_assembly = enable;
        self
    }

    /// Apply the [`ReconstructParams::fine`] preset, keeping parallelism.
    pub fn fine(mut self) -> Self {
        self.params = ReconstructParams {
            parallel_field: self.params.parallel_field,
            parallel_assembly: self.params.parallel_assembly,
            ..ReconstructParams::fine()
        };
        self
    }

    /// Apply the [`ReconstructParams::coarse`] preset, keeping parallelism.
    pub fn coarse(mut self) -> Self {
        self.params = ReconstructParams {
            parallel_field: self.params.parallel_field,
            parallel_assembly: self.params.parallel_assembly,
            ..ReconstructParams::coarse()
        };
        self
    }

    /// Current parameter set.
    pub fn params(&self) -> &ReconstructParams {
        &self.params
    }

    /// Run the reconstruction.
    pub fn build(self) -> ReconstructResult<ReconstructionOutput> {
        reconstruct(self.cloud, &self.params)
    }
}
