//! grid_stat_vis: verification statistics post-processing and plotting
//!
//! Turns the ASCII stat tables written by a gridded verification tool into
//! per-initialization bundles, concatenates bundles across cases and
//! configurations, and renders line and heatmap figures from them. A
//! second tool rewrites model history files as CF-1.6 NetCDF with derived
//! precipitation and moisture diagnostics.
//!
//! ## Module Organization
//!
//! - [`frame`]: column-typed stat frames with missing values
//! - [`ingest`]: stat-table parsing and bundle persistence
//! - [`concat`]: tagging and concatenation of bundles
//! - [`plot`]: plot driver, figure models and rendering
//! - [`cf`]: CF NetCDF rewriting of model history files
//! - [`config`]: YAML job descriptions and their validation
//! - [`ordering`]: lead and threshold ordering
//! - [`timeutil`]: date, hour and lead-string handling
//! - [`joblog`]: per-job warning logs
//! - [`parallel`]: worker pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grid_stat_vis::prelude::*;
//! use std::path::Path;
//!
//! let request = PlotRequest::from_file(Path::new("plot.yaml")).unwrap();
//! let figure = grid_stat_vis::plot::render_request(&request).unwrap();
//! println!("{}", figure.display());
//! ```

pub mod cf;
pub mod concat;
pub mod config;
pub mod errors;
pub mod frame;
pub mod ingest;
pub mod joblog;
pub mod ordering;
pub mod parallel;
pub mod plot;
pub mod timeutil;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::cf::{run_rewrite, ModelKind, RewriteJob};
    pub use crate::concat::run_concat;
    pub use crate::config::{ConcatConfig, ConfigDescriptor, IngestConfig, PlotKind, PlotRequest};
    pub use crate::errors::{Result, VerifError};
    pub use crate::frame::StatFrame;
    pub use crate::ingest::{read_bundle, run_ingest, write_bundle, StatBundle};
    pub use crate::parallel::ParallelConfig;
    pub use crate::plot::{build_figure, render_request, Figure};
}
