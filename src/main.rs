//! Entry point for gsvis.
//! Sets up logging, parses the command line and dispatches to the job runners.

mod cli;

use clap::Parser;
use cli::{Args, Command};
use env_logger::Env;
use grid_stat_vis::cf::{run_rewrite, RewriteJob};
use grid_stat_vis::concat::run_concat;
use grid_stat_vis::config::{load_yaml, ConcatConfig, IngestConfig, PlotRequest};
use grid_stat_vis::errors::Result;
use grid_stat_vis::ingest::run_ingest;
use grid_stat_vis::parallel::ParallelConfig;
use grid_stat_vis::plot::render_request;
use log::{error, info, warn};
use std::process::ExitCode;

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Ingest {
            config,
            threads,
            out_root,
        } => {
            let mut job: IngestConfig = load_yaml(&config)?;
            if let Some(root) = out_root {
                job.out_root = root;
            }
            job.check()?;
            let parallel = ParallelConfig::new(threads.or(job.threads));
            let summary = run_ingest(&job, &parallel)?;
            info!("Wrote {} bundles for case {}", summary.written.len(), job.case);
        }
        Command::Concat { config, out_root } => {
            let mut job: ConcatConfig = load_yaml(&config)?;
            if let Some(root) = out_root {
                job.out_root = root;
            }
            job.check()?;
            let path = run_concat(&job)?;
            info!("Concatenated store written to {}", path.display());
        }
        Command::Plot {
            request,
            out_root,
            show,
        } => {
            let mut request: PlotRequest = load_yaml(&request)?;
            if let Some(root) = out_root {
                request.out_root = root;
            }
            request.show |= show;
            request.check()?;
            render_request(&request)?;
        }
        Command::CfRewrite { job, output_dir } => {
            let mut job: RewriteJob = load_yaml(&job)?;
            if let Some(dir) = output_dir {
                job.output_dir = dir;
            }
            job.check()?;
            let written = run_rewrite(&job)?;
            info!("Wrote {} CF files", written.len());
        }
    }
    Ok(())
}

fn exit_status(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if !e.is_fatal() => {
            warn!("{}", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let logger_env = Env::new().filter_or("GSVIS_LOG_LEVEL", default_level);
    let mut builder = env_logger::Builder::from_env(logger_env);
    builder.format_timestamp_millis();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    exit_status(run(args))
}
