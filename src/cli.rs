//! Defines command-line interface options using `clap` for gsvis.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Verification statistics post-processing and plotting
#[derive(Parser, Debug)]
#[command(
    name = "gsvis",
    version,
    about = "Ingest, concatenate and plot gridded verification statistics; rewrite model output as CF NetCDF"
)]
pub struct Args {
    /// Enable debug logging (overrides GSVIS_LOG_LEVEL).
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse stat tables into one bundle per forecast initialization
    Ingest {
        /// YAML ingest job
        config: PathBuf,

        /// Number of worker threads. Defaults to CPU count minus one.
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Override the bundle output root
        #[arg(long)]
        out_root: Option<PathBuf>,
    },

    /// Concatenate bundles into one tagged store
    Concat {
        /// YAML concatenation job
        config: PathBuf,

        /// Override the store output root
        #[arg(long)]
        out_root: Option<PathBuf>,
    },

    /// Render one figure from ingested bundles
    Plot {
        /// YAML plot request
        request: PathBuf,

        /// Override the figure output root
        #[arg(long)]
        out_root: Option<PathBuf>,

        /// Print the written figure path
        #[arg(long, default_value_t = false)]
        show: bool,
    },

    /// Rewrite a model history file as CF NetCDF, one file per valid time
    CfRewrite {
        /// YAML rewrite job
        job: PathBuf,

        /// Override the output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}
