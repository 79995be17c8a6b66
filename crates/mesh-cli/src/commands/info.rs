//! mesh info command - display point cloud statistics.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_reconstruct::PointCloud;
use mesh_reconstruct::grid::GridExtent;
use serde::Serialize;
use tracing::debug;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct CloudInfo {
    path: String,
    points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<BoundsInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    centroid: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid: Option<GridInfo>,
}

#[derive(Serialize)]
struct BoundsInfo {
    min: [f64; 3],
    max: [f64; 3],
    dimensions: [f64; 3],
}

#[derive(Serialize)]
struct GridInfo {
    voxel_size: f64,
    padding: u32,
    dims: [u64; 3],
    /// Worst case: every point in its own voxel.
    max_cells: usize,
}

pub fn run(input: &Path, voxel_size: f64, padding: u32, cli: &Cli) -> Result<()> {
    let cloud = PointCloud::load(input)
        .with_context(|| format!("Failed to load point cloud from {:?}", input))?;

    let bbox = cloud.bounds();
    let bounds = (!bbox.is_empty()).then(|| {
        let (min, max, dims) = (bbox.min(), bbox.max(), bbox.extents());
        BoundsInfo {
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
            dimensions: [dims.x, dims.y, dims.z],
        }
    });

    // Empty clouds get no estimate; bad parameters are reported.
    let grid = if cloud.is_empty() {
        None
    } else {
        let extent = GridExtent::new(bbox, voxel_size, padding)?;
        debug!(dims = ?extent.axis_counts(), voxel_size, padding, "Grid estimate");
        Some(GridInfo {
            voxel_size,
            padding,
            dims: extent.axis_counts(),
            max_cells: cloud.len().saturating_mul(8),
        })
    };

    let info = CloudInfo {
        path: input.display().to_string(),
        points: cloud.len(),
        bounds,
        centroid: cloud.centroid().map(|c| [c.x, c.y, c.z]),
        grid,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Point Cloud Information".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!("  {}: {}", "Points".cyan(), info.points);

                if let Some(ref b) = info.bounds {
                    println!(
                        "  {}: {:.3} x {:.3} x {:.3}",
                        "Dimensions".cyan(),
                        b.dimensions[0],
                        b.dimensions[1],
                        b.dimensions[2]
                    );
                    println!(
                        "  {}: ({:.3}, {:.3}, {:.3})",
                        "Min bounds".cyan(),
                        b.min[0],
                        b.min[1],
                        b.min[2]
                    );
                    println!(
                        "  {}: ({:.3}, {:.3}, {:.3})",
                        "Max bounds".cyan(),
                        b.max[0],
                        b.max[1],
                        b.max[2]
                    );
                }

                if let Some(ref g) = info.grid {
                    println!(
                        "  {}: {} x {} x {} at voxel size {} (padding {})",
                        "Grid".cyan(),
                        g.dims[0],
                        g.dims[1],
                        g.dims[2],
                        g.voxel_size,
                        g.padding
                    );
                    println!("  {}: {}", "Max cells".cyan(), g.max_cells);
                }
            }
        }
    }

    Ok(())
}
