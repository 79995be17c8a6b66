//! Reconstruction parameters with TOML persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReconstructError, ReconstructResult};
use crate::grid::DEFAULT_PADDING_VOXELS;

/// Parameters for surface reconstruction.
///
/// # Example TOML
///
/// ```toml
/// voxel_size = 0.5
/// padding_voxels = 2
/// iso_level = 0.0
/// normal_neighbors = 12
/// distance_neighbors = 8
/// parallel_field = true
/// ```
///
/// Missing keys take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructParams {
    /// Edge length of a grid cell, in input units.
    pub voxel_size: f64,
    /// Margin in voxels on every side of the bounding box. At least 1.
    pub padding_voxels: u32,
    /// Field value of the extracted surface.
    pub iso_level: f64,
    /// Neighbours used to estimate each point normal.
    pub normal_neighbors: usize,
    /// Neighbours averaged when evaluating the distance at a query point.
    pub distance_neighbors: usize,
    /// Evaluate the distance field on the rayon pool.
    pub parallel_field: bool,
    /// Polygonize cells on the rayon pool.
    pub parallel_assembly: bool,
}

impl Default for ReconstructParams {
    fn default() -> Self {
        Self {
            voxel_size: 1.0,
            padding_voxels: DEFAULT_PADDING_VOXELS,
            iso_level: 0.0,
            normal_neighbors: 10,
            distance_neighbors: 10,
            parallel_field: false,
            parallel_assembly: false,
        }
    }
}

impl ReconstructParams {
    /// Small voxels and wider neighbourhoods for dense scans.
    pub fn fine() -> Self {
        Self {
            voxel_size: 0.25,
            normal_neighbors: 16,
            distance_neighbors: 12,
            ..Default::default()
        }
    }

    /// Large voxels for quick previews.
    pub fn coarse() -> Self {
        Self {
            voxel_size: 4.0,
            normal_neighbors: 8,
            distance_neighbors: 6,
            ..Default::default()
        }
    }

    /// Defaults with the given voxel size.
    pub fn with_voxel_size(voxel_size: f64) -> Self {
        Self {
            voxel_size,
            ..Default::default()
        }
    }

    /// Enable both parallel passes.
    pub fn with_parallel(mut self) -> Self {
        self.parallel_field = true;
        self.parallel_assembly = true;
        self
    }

    /// Check every parameter is usable.
    pub fn validate(&self) -> ReconstructResult<()> {
        if !self.voxel_size.is_finite() || self.voxel_size <= 0.0 {
            return Err(ReconstructError::invalid_param(
                "voxel_size",
                self.voxel_size,
                "voxel size must be a positive finite number",
            ));
        }
        if self.padding_voxels == 0 {
            return Err(ReconstructError::invalid_param(
                "padding_voxels",
                self.padding_voxels,
                "padding must be at least one voxel",
            ));
        }
        if !self.iso_level.is_finite() {
            return Err(ReconstructError::invalid_param(
                "iso_level",
                self.iso_level,
                "iso level must be finite",
            ));
        }
        if self.normal_neighbors == 0 {
            return Err(ReconstructError::invalid_param(
                "normal_neighbors",
                self.normal_neighbors,
                "at least one neighbour is required",
            ));
        }
        if self.distance_neighbors == 0 {
            return Err(ReconstructError::invalid_param(
                "distance_neighbors",
                self.distance_neighbors,
                "at least one neighbour is required",
            ));
        }
        Ok(())
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> ReconstructResult<Self> {
        toml::from_str(toml_str).map_err(|e| ReconstructError::config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ReconstructResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ReconstructError::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> ReconstructResult<String> {
        toml::to_string_pretty(self).map_err(|e| ReconstructError::config(e.to_string()))
    }

    /// Save to a TOML file.
    pub fn save_toml(&self, path: impl AsRef<Path>) -> ReconstructResult<()> {
        let path = path.as_ref();
        let toml_str = self.to_toml()?;
        std::fs::write(path, toml_str).map_err(|source| ReconstructError::IoWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = ReconstructParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.padding_voxels, 2);
        assert!(ReconstructParams::fine().validate().is_ok());
        assert!(ReconstructParams::coarse().validate().is_ok());
    }

    #[test]
    fn test_presets_order() {
        assert!(ReconstructParams::fine().voxel_size < ReconstructParams::coarse().voxel_size);
        let p = ReconstructParams::with_voxel_size(0.3).with_parallel();
        assert_eq!(p.voxel_size, 0.3);
        assert!(p.parallel_field && p.parallel_assembly);
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            ReconstructParams { voxel_size: 0.0, ..Default::default() },
            ReconstructParams { voxel_size: f64::NAN, ..Default::default() },
            ReconstructParams { padding_voxels: 0, ..Default::default() },
            ReconstructParams { iso_level: f64::INFINITY, ..Default::default() },
            ReconstructParams { normal_neighbors: 0, ..Default::default() },
            ReconstructParams { distance_neighbors: 0, ..Default::default() },
        ];
        for params in cases {
            let err = params.validate().unwrap_err();
            assert!(matches!(err, ReconstructError::InvalidParams { param_name: Some(_), .. }));
        }
    }

    #[test]
    fn test_toml_partial() {
        let params = ReconstructParams::from_toml("voxel_size = 0.5\nparallel_field = true\n").unwrap();
        assert_eq!(params.voxel_size, 0.5);
        assert!(params.parallel_field);
        assert_eq!(params.normal_neighbors, 10);
    }

    #[test]
    fn test_toml_round_trip() {
        let params = ReconstructParams::fine().with_parallel();
        let text = params.to_toml().unwrap();
        assert_eq!(ReconstructParams::from_toml(&text).unwrap(), params);
    }

    #[test]
    fn test_toml_type_error() {
        let err = ReconstructParams::from_toml("voxel_size = \"big\"").unwrap_err();
        assert!(matches!(err, ReconstructError::Config { .. }));
    }
}
