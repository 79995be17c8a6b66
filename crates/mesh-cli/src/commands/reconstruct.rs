//! mesh reconstruct command - point cloud to triangle mesh.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_reconstruct::{
    MeshFormat, PointCloud, ReconstructBuilder, ReconstructParams, ReconstructionStats, save_grid,
    save_mesh, save_ply_ascii,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{Cli, OutputFormat, ParamOverrides, output};

/// Where and how results are written besides the mesh path.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions<'a> {
    /// ASCII instead of binary PLY.
    pub ascii: bool,
    /// Grid dump destination.
    pub grid_out: Option<&'a Path>,
}

#[derive(Serialize)]
struct ReconstructResult {
    input: String,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid: Option<String>,
    success: bool,
    voxel_size: f64,
    #[serde(flatten)]
    stats: ReconstructionStats,
}

/// Resolve parameters: defaults, then the config file, then flags.
fn resolve_params(config: Option<&Path>, overrides: &ParamOverrides) -> Result<ReconstructParams> {
    let mut params = match config {
        Some(path) => ReconstructParams::from_toml_file(path)?,
        None => ReconstructParams::default(),
    };

    if let Some(v) = overrides.voxel_size {
        params.voxel_size = v;
    }
    if let Some(p) = overrides.padding {
        params.padding_voxels = p;
    }
    if let Some(iso) = overrides.iso_level {
        params.iso_level = iso;
    }
    if let Some(k) = overrides.normal_neighbors {
        params.normal_neighbors = k;
    }
    if let Some(k) = overrides.distance_neighbors {
        params.distance_neighbors = k;
    }
    if overrides.parallel {
        params = params.with_parallel();
    }

    Ok(params)
}

pub fn run(
    input: &Path,
    output_path: &Path,
    options: &OutputOptions<'_>,
    config: Option<&Path>,
    overrides: &ParamOverrides,
    cli: &Cli,
) -> Result<()> {
    let params = resolve_params(config, overrides)?;
    debug!(?params, ?config, "Resolved parameters");

    let cloud = PointCloud::load(input)
        .with_context(|| format!("Failed to load point cloud from {:?}", input))?;

    output::info(
        &format!(
            "Reconstructing {} points at voxel size {}...",
            cloud.len(),
            params.voxel_size
        ),
        cli.format,
        cli.quiet,
    );

    let result = ReconstructBuilder::new(&cloud).with_params(params.clone()).build()?;

    let as_ascii_ply = options.ascii && MeshFormat::from_path(output_path) == Some(MeshFormat::Ply);
    info!(path = ?output_path, ascii = as_ascii_ply, "Writing mesh");
    if as_ascii_ply {
        save_ply_ascii(&result.mesh, output_path)
    } else {
        save_mesh(&result.mesh, output_path)
    }
    .with_context(|| format!("Failed to save mesh to {:?}", output_path))?;

    if let Some(grid_path) = options.grid_out {
        info!(path = ?grid_path, cells = result.grid.cell_count(), "Writing grid dump");
        save_grid(&result.grid, cloud.points(), grid_path)
            .with_context(|| format!("Failed to save grid to {:?}", grid_path))?;
    }

    let summary = ReconstructResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        grid: options.grid_out.map(|p| p.display().to_string()),
        success: true,
        voxel_size: params.voxel_size,
        stats: result.stats,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                let stats = &summary.stats;
                output::success(
                    &format!("Mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                if let Some(grid_path) = options.grid_out {
                    println!("  {}: {}", "Grid dump".cyan(), grid_path.display());
                }
                println!(
                    "  {}: {} x {} x {}",
                    "Grid".cyan(),
                    stats.grid_dims[0],
                    stats.grid_dims[1],
                    stats.grid_dims[2]
                );
                println!(
                    "  {}: {} cells, {} query points",
                    "Sparse grid".cyan(),
                    stats.cells,
                    stats.query_points
                );
                if stats.failed_evaluations > 0 {
                    println!(
                        "  {}: {}",
                        "Failed evaluations".yellow(),
                        stats.failed_evaluations
                    );
                }
                println!(
                    "  {}: {} vertices, {} faces",
                    "Mesh".cyan(),
                    stats.output_vertices,
                    stats.output_faces
                );
                println!(
                    "  {}: {} ms (grid {}, field {}, assembly {})",
                    "Time".cyan(),
                    stats.total_time_ms,
                    stats.grid_time_ms,
                    stats.field_time_ms,
                    stats.assembly_time_ms
                );
            }
        }
    }

    Ok(())
}
