//! Surface reconstruction from unorganized point clouds on a sparse dual
//! voxel grid.
//!
//! Cells are created only around input points, every cell corner is stored
//! once and shared by all cells touching it, and the distance field is
//! sampled once per shared corner before marching cubes stitches the cells
//! into a single indexed mesh.
//!
//! # Features
//!
//! - **Sparse hash grid**: cells addressed by a packed 64-bit key, no dense volume
//! - **Shared corners**: each lattice position is evaluated exactly once
//! - **Deterministic output**: cell creation order fixes vertex numbering,
//!   parallel passes produce the same mesh as sequential ones
//! - **Builder API**: fluent configuration with TOML persistence
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_reconstruct::{PointCloud, ReconstructBuilder};
//!
//! let cloud = PointCloud::load("scan.xyz").unwrap();
//!
//! let result = ReconstructBuilder::new(&cloud)
//!     .voxel_size(0.5)
//!     .build()
//!     .unwrap();
//!
//! println!("{} faces", result.mesh.face_count());
//! result.mesh.save("surface.ply").unwrap();
//! ```
//!
//! # Low-Level API
//!
//! The stages can be driven one by one, with any [`DistanceField`] and
//! [`Polygonizer`]:
//!
//! ```
//! use mesh_reconstruct::grid::{GridExtent, SparseGrid};
//! use mesh_reconstruct::{assemble_mesh, evaluate_field, MarchingCubes, Mesh, PointCloud};
//! use nalgebra::Point3;
//!
//! let cloud: PointCloud = (0..200)
//!     .map(|i| {
//!         let t = i as f64 * 0.1;
//!         Point3::new(2.0 * t.cos(), 2.0 * t.sin(), 0.05 * i as f64 - 5.0)
//!     })
//!     .collect();
//!
//! let extent = GridExtent::new(cloud.bounds(), 0.5, 2).unwrap();
//! let mut grid = SparseGrid::build(cloud.points(), extent).unwrap();
//!
//! // Infinite cylinder of radius 2 around the z axis.
//! let cylinder = |p: &Point3<f64>| Some((p.x * p.x + p.y * p.y).sqrt() - 2.0);
//! evaluate_field(grid.query_points_mut(), &cylinder);
//!
//! let mut mesh = Mesh::new();
//! assemble_mesh(&grid, &MarchingCubes::new(0.0), &mut mesh).unwrap();
//! assert!(mesh.face_count() > 0);
//! ```

mod assembly;
mod builder;
mod error;
mod field;
pub mod grid;
mod io;
mod mesh;
mod params;
mod pointcloud;
mod polygonize;
mod reconstruct;
mod types;

pub use error::{ErrorCode, ReconstructError, ReconstructResult, RecoverySuggestion};
pub use types::BoundingBox;

// Builder API (recommended)
pub use builder::ReconstructBuilder;

// Pipeline
pub use params::ReconstructParams;
pub use reconstruct::{ReconstructionOutput, ReconstructionStats, reconstruct, reconstruct_with};

// File I/O
pub use io::{
    MeshFormat, PointCloudFormat, load_point_cloud, read_xyz, save_grid, save_mesh, save_obj,
    save_ply, save_ply_ascii,
};
pub use pointcloud::PointCloud;

// Field evaluation
pub use field::{
    DistanceField, FieldEvaluationStats, PointCloudDistance, evaluate_field,
    evaluate_field_parallel,
};

// Polygonization and assembly
pub use assembly::{AssemblyStats, assemble_mesh, assemble_mesh_parallel};
pub use mesh::{Mesh, MeshSink, Vertex};
pub use polygonize::{CornerSample, MarchingCubes, Polygonizer};
