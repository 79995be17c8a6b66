// Allow unused_assignments lint for error struct fields that are used in thiserror Display macros
// but appear as "never read" to the compiler.
#![allow(unused_assignments)]

//! Error types for surface reconstruction with rich diagnostics.
//!
//! This module provides:
//! - Machine-readable error codes for programmatic handling
//! - Rich context (offending parameter, point index, grid extents)
//! - Recovery suggestions for common issues
//! - Terminal display via miette

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::grid::VoxelCoord;

/// Result type alias for reconstruction operations.
pub type ReconstructResult<T> = Result<T, ReconstructError>;

/// Machine-readable error codes for reconstruction operations.
///
/// Codes follow the pattern `RECON-XXXX` where:
/// - 1xxx = Input and configuration errors
/// - 2xxx = Grid construction errors
/// - 3xxx = Output errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// RECON-1001: Invalid parameters
    InvalidParams = 1001,
    /// RECON-1002: Point cloud is empty
    EmptyPointCloud = 1002,
    /// RECON-1003: Point has a NaN or infinite coordinate
    InvalidCoordinate = 1003,
    /// RECON-1004: Failed to read input
    IoRead = 1004,
    /// RECON-1005: Failed to parse input
    ParseError = 1005,
    /// RECON-1006: Unsupported file format
    UnsupportedFormat = 1006,
    /// RECON-1007: Configuration file could not be loaded
    Config = 1007,

    /// RECON-2001: Padded grid extents exceed the key space
    GridTooLarge = 2001,
    /// RECON-2002: Cell coordinate outside the padded grid extents
    OutsideGridExtent = 2002,

    /// RECON-3001: Isosurface extraction produced no triangles
    EmptyIsosurface = 3001,
    /// RECON-3002: Failed to write output
    IoWrite = 3002,
    /// RECON-3003: Mesh vertex count exceeds 32-bit indices
    MeshTooLarge = 3003,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `RECON-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParams => "RECON-1001",
            ErrorCode::EmptyPointCloud => "RECON-1002",
            ErrorCode::InvalidCoordinate => "RECON-1003",
            ErrorCode::IoRead => "RECON-1004",
            ErrorCode::ParseError => "RECON-1005",
            ErrorCode::UnsupportedFormat => "RECON-1006",
            ErrorCode::Config => "RECON-1007",
            ErrorCode::GridTooLarge => "RECON-2001",
            ErrorCode::OutsideGridExtent => "RECON-2002",
            ErrorCode::EmptyIsosurface => "RECON-3001",
            ErrorCode::IoWrite => "RECON-3002",
            ErrorCode::MeshTooLarge => "RECON-3003",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for reconstruction errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoverySuggestion {
    /// Use a larger voxel size.
    IncreaseVoxelSize { current: f64, suggested: f64 },
    /// Check the input file for the listed problem.
    CheckInput { details: String },
    /// Save the output with a different extension.
    UseDifferentFormat { suggested: Vec<String> },
    /// Adjust the iso level or neighbourhood sizes.
    AdjustFieldParameters,
    /// No specific suggestion.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::IncreaseVoxelSize { current, suggested } => {
                write!(
                    f,
                    "Increase voxel size from {:.4} to at least {:.4}",
                    current, suggested
                )
            }
            RecoverySuggestion::CheckInput { details } => {
                write!(f, "Check the input point cloud: {}", details)
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Use one of the supported formats: {}", suggested.join(", "))
            }
            RecoverySuggestion::AdjustFieldParameters => {
                write!(
                    f,
                    "Adjust the iso level or the number of neighbours used for the distance field"
                )
            }
            RecoverySuggestion::None => write!(f, "No specific suggestion available"),
        }
    }
}

/// Errors that can occur while reconstructing a surface.
#[derive(Debug, Error, Diagnostic)]
pub enum ReconstructError {
    /// Invalid parameters.
    #[error("invalid reconstruction parameters: {details}")]
    #[diagnostic(
        code(reconstruct::params::invalid),
        help("Check parameter values: voxel_size > 0, padding_voxels >= 1, neighbour counts >= 1")
    )]
    InvalidParams {
        details: String,
        param_name: Option<String>,
        param_value: Option<String>,
    },

    /// Point cloud has no points.
    #[error("point cloud is empty")]
    #[diagnostic(
        code(reconstruct::input::empty),
        help("The input must contain at least one point. Check that the file was loaded correctly.")
    )]
    EmptyPointCloud,

    /// A point has a non-finite coordinate.
    #[error("point {index} has a non-finite coordinate ({x}, {y}, {z})")]
    #[diagnostic(
        code(reconstruct::input::invalid_coordinate),
        help("Remove NaN or infinite values from the input before reconstruction.")
    )]
    InvalidCoordinate { index: usize, x: f64, y: f64, z: f64 },

    /// The padded grid is too large to pack into a 64-bit key.
    #[error("grid too large: padded extents {dims:?} exceed the 64-bit cell key space")]
    #[diagnostic(
        code(reconstruct::grid::too_large),
        help("Increase the voxel size or split the point cloud into smaller pieces.")
    )]
    GridTooLarge { dims: [u64; 3], voxel_size: f64 },

    /// A cell coordinate fell outside the padded extents.
    #[error("cell {coord:?} lies outside the padded grid extents {dims:?}")]
    #[diagnostic(
        code(reconstruct::grid::outside_extent),
        help("The grid extents were sized from a different bounding box than the points. Rebuild the grid from the cloud's own bounds.")
    )]
    OutsideGridExtent { coord: VoxelCoord, dims: [u64; 3] },

    /// No triangles were produced.
    #[error("isosurface extraction produced an empty mesh")]
    #[diagnostic(
        code(reconstruct::isosurface::empty),
        help("The voxel size may be too large for the cloud, or the iso level lies outside the field's range.")
    )]
    EmptyIsosurface,

    /// Assembly would number more vertices than a `u32` index holds.
    #[error("mesh needs {vertices} vertices, more than 32-bit indices allow")]
    #[diagnostic(
        code(reconstruct::isosurface::too_large),
        help("Increase the voxel size or split the cloud into tiles.")
    )]
    MeshTooLarge { vertices: u64 },

    /// Failed to read an input file.
    #[error("failed to read {path:?}: {source}")]
    #[diagnostic(code(reconstruct::io::read))]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write an output file.
    #[error("failed to write {path:?}: {source}")]
    #[diagnostic(code(reconstruct::io::write))]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse an input file.
    #[error("failed to parse {path:?}: {details}")]
    #[diagnostic(code(reconstruct::io::parse))]
    ParseError { path: PathBuf, details: String },

    /// Unknown file extension.
    #[error("unsupported file format: {extension:?}")]
    #[diagnostic(
        code(reconstruct::io::unsupported_format),
        help("Point clouds: .xyz, .pts, .txt, .ply. Meshes: .ply, .obj")
    )]
    UnsupportedFormat { extension: Option<String> },

    /// Configuration file could not be loaded.
    #[error("failed to load configuration: {details}")]
    #[diagnostic(code(reconstruct::config::invalid))]
    Config { details: String },
}

impl ReconstructError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReconstructError::InvalidParams { .. } => ErrorCode::InvalidParams,
            ReconstructError::EmptyPointCloud => ErrorCode::EmptyPointCloud,
            ReconstructError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            ReconstructError::GridTooLarge { .. } => ErrorCode::GridTooLarge,
            ReconstructError::OutsideGridExtent { .. } => ErrorCode::OutsideGridExtent,
            ReconstructError::EmptyIsosurface => ErrorCode::EmptyIsosurface,
            ReconstructError::MeshTooLarge { .. } => ErrorCode::MeshTooLarge,
            ReconstructError::IoRead { .. } => ErrorCode::IoRead,
            ReconstructError::IoWrite { .. } => ErrorCode::IoWrite,
            ReconstructError::ParseError { .. } => ErrorCode::ParseError,
            ReconstructError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            ReconstructError::Config { .. } => ErrorCode::Config,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            ReconstructError::GridTooLarge { voxel_size, .. } => {
                RecoverySuggestion::IncreaseVoxelSize {
                    current: *voxel_size,
                    suggested: voxel_size * 2.0,
                }
            }
            ReconstructError::EmptyPointCloud => RecoverySuggestion::CheckInput {
                details: "the file contains no readable points".to_string(),
            },
            ReconstructError::InvalidCoordinate { index, .. } => RecoverySuggestion::CheckInput {
                details: format!("point {} is not finite", index),
            },
            ReconstructError::ParseError { details, .. } => RecoverySuggestion::CheckInput {
                details: details.clone(),
            },
            ReconstructError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["ply".to_string(), "obj".to_string(), "xyz".to_string()],
            },
            ReconstructError::EmptyIsosurface => RecoverySuggestion::AdjustFieldParameters,
            _ => RecoverySuggestion::None,
        }
    }

    // Constructor helpers

    /// Create an invalid params error.
    pub fn invalid_params(details: impl Into<String>) -> Self {
        ReconstructError::InvalidParams {
            details: details.into(),
            param_name: None,
            param_value: None,
        }
    }

    /// Create an invalid params error with param info.
    pub fn invalid_param(
        param_name: impl Into<String>,
        param_value: impl ToString,
        details: impl Into<String>,
    ) -> Self {
        ReconstructError::InvalidParams {
            details: details.into(),
            param_name: Some(param_name.into()),
            param_value: Some(param_value.to_string()),
        }
    }

    /// Create a configuration error.
    pub fn config(details: impl Into<String>) -> Self {
        ReconstructError::Config {
            details: details.into(),
        }
    }
}
