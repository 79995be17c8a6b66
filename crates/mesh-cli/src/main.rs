//! mesh: command-line surface reconstruction from point clouds.
//!
//! Wraps the mesh-reconstruct pipeline for scripting and batch jobs.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_reconstruct=info` - Stage summaries and timings
//! - `RUST_LOG=mesh_reconstruct=debug` - Per-batch progress
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Reconstruct a scan with 0.5 unit cells
//! mesh reconstruct scan.xyz -o surface.ply --voxel-size 0.5
//!
//! # Keep the sampled grid for inspection
//! mesh reconstruct scan.xyz -o surface.obj --grid-out scan.grid
//!
//! # Inspect a cloud before choosing a voxel size
//! mesh info scan.xyz --voxel-size 0.5 --format json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{info, reconstruct};

/// mesh - Reconstruct surfaces from unorganized point clouds.
///
/// Builds a sparse voxel grid around the input points, samples a distance
/// field at the shared cell corners and extracts a triangle mesh.
#[derive(Parser)]
#[command(name = "mesh")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct a triangle mesh from a point cloud
    Reconstruct {
        /// Input point cloud (.xyz, .pts, .txt, .asc, .ply)
        input: PathBuf,

        /// Output mesh file (.ply or .obj)
        #[arg(short, long)]
        output: PathBuf,

        /// Load parameters from a TOML file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write PLY output as ASCII instead of binary
        #[arg(long)]
        ascii: bool,

        /// Also dump the input points and every cell's corners to this file
        #[arg(long, value_name = "PATH")]
        grid_out: Option<PathBuf>,

        #[command(flatten)]
        overrides: ParamOverrides,
    },

    /// Display point cloud statistics and the grid it would produce
    Info {
        /// Input point cloud
        input: PathBuf,

        /// Voxel size used for the grid estimate
        #[arg(long, default_value = "1.0")]
        voxel_size: f64,

        /// Padding in voxels used for the grid estimate
        #[arg(long, default_value = "2")]
        padding: u32,
    },
}

/// Per-parameter overrides for `mesh reconstruct`.
#[derive(Args, Clone, Default)]
pub struct ParamOverrides {
    /// Cell edge length in input units
    #[arg(long)]
    pub voxel_size: Option<f64>,

    /// Margin in voxels around the bounding box
    #[arg(long)]
    pub padding: Option<u32>,

    /// Field value of the extracted surface
    #[arg(long, allow_hyphen_values = true)]
    pub iso_level: Option<f64>,

    /// Neighbours used to estimate point normals
    #[arg(long)]
    pub normal_neighbors: Option<usize>,

    /// Neighbours averaged per distance query
    #[arg(long)]
    pub distance_neighbors: Option<usize>,

    /// Evaluate the field and polygonize on all cores
    #[arg(long)]
    pub parallel: bool,
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_reconstruct=info,mesh_cli=info",
            2 => "mesh_reconstruct=debug,mesh_cli=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    // Nicer panic reports in development builds
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Reconstruct {
            input,
            output,
            config,
            ascii,
            grid_out,
            overrides,
        } => reconstruct::run(
            input,
            output,
            &reconstruct::OutputOptions {
                ascii: *ascii,
                grid_out: grid_out.as_deref(),
            },
            config.as_deref(),
            overrides,
            &cli,
        ),
        Commands::Info {
            input,
            voxel_size,
            padding,
        } => info::run(input, *voxel_size, *padding, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(err) = e.downcast_ref::<mesh_reconstruct::ReconstructError>() {
                eprintln!("{}: {}", "Error".red().bold(), err);
                eprintln!("  {}: {}", "Code".cyan(), err.code());
                eprintln!("  {}: {}", "Suggestion".green(), err.recovery_suggestion());
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
