//! Stat-table ingestion
//!
//! Parses the whitespace-delimited ASCII tables the gridded-statistics tool
//! writes for one forecast initialization and persists them as a single
//! bundle `{stat family -> frame}`. The stat family is the filename suffix:
//! `grid_stat_QPF_24hr_240000L_20221228_000000V_cnt.txt` belongs to `cnt`.

use crate::config::IngestConfig;
use crate::errors::{Result, VerifError};
use crate::frame::StatFrame;
use crate::joblog::JobLog;
use crate::parallel::ParallelConfig;
use crate::timeutil::format_cycle;
use chrono::NaiveDateTime;
use log::{debug, error, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// All frames of one forecast initialization, keyed by stat family.
pub type StatBundle = BTreeMap<String, StatFrame>;

/// Name of the per-initialization ingest log.
pub const INGEST_LOG: &str = "ingest.log";

/// Result of parsing one ASCII table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableParse {
    /// Header and at least one record.
    Rows(StatFrame),
    /// No non-empty line at all.
    Empty,
    /// A header but no records.
    HeaderOnly,
}

/// What one initialization's ingest produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub files: usize,
    pub skipped: usize,
    pub families: Vec<String>,
    pub bundle: Option<PathBuf>,
}

/// Stat family of a table: the part of the file stem after the last `_`.
pub fn stat_suffix(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (_, suffix) = stem.rsplit_once('_')?;
    if suffix.is_empty() {
        None
    } else {
        Some(suffix.to_string())
    }
}

/// Parses table text. The first non-empty line is the header; each later
/// non-empty line is one record.
pub fn parse_stat_text(text: &str, first_index: u64) -> TableParse {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = match lines.next() {
        Some(line) => line.split_whitespace().map(str::to_string).collect(),
        None => return TableParse::Empty,
    };
    let records: Vec<Vec<String>> = lines
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect();
    if records.is_empty() {
        return TableParse::HeaderOnly;
    }
    TableParse::Rows(StatFrame::from_records(&header, &records, first_index))
}

pub fn parse_stat_file(path: &Path, first_index: u64) -> Result<TableParse> {
    let text = fs::read_to_string(path)?;
    Ok(parse_stat_text(&text, first_index))
}

/// Tables of `prefix` in `dir`, sorted by name.
pub fn find_stat_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(VerifError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    let pattern = format!(
        "{}/{}_*.txt",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(prefix)
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    if files.is_empty() {
        return Err(VerifError::NoMatchingFiles { pattern });
    }
    files.sort();
    Ok(files)
}

/// Parses every table of `prefix` in `dir` into a bundle. Frames sharing a
/// family are concatenated with a per-family running row index. Empty and
/// header-only tables are reported to `log` and skipped.
pub fn collect_bundle(dir: &Path, prefix: &str, log: &JobLog) -> Result<(StatBundle, usize, usize)> {
    let files = find_stat_files(dir, prefix)?;
    let mut bundle = StatBundle::new();
    let mut skipped = 0;

    for path in &files {
        let Some(suffix) = stat_suffix(path) else {
            log.warn(&format!("Cannot infer stat family of {}, skipping", path.display()));
            skipped += 1;
            continue;
        };
        let next_index = bundle.get(&suffix).map_or(0, |f| f.len() as u64);
        match parse_stat_file(path, next_index)? {
            TableParse::Rows(frame) => {
                debug!("Parsed {} rows of {} from {}", frame.len(), suffix, path.display());
                match bundle.get_mut(&suffix) {
                    Some(existing) => existing.append(&frame),
                    None => {
                        bundle.insert(suffix, frame);
                    }
                }
            }
            TableParse::Empty => {
                log.warn(&format!("Empty file {}, skipping", path.display()));
                skipped += 1;
            }
            TableParse::HeaderOnly => {
                log.warn(&format!("File {} has a header but no data rows", path.display()));
                skipped += 1;
            }
        }
    }
    Ok((bundle, files.len(), skipped))
}

pub fn write_bundle(path: &Path, bundle: &StatBundle) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec(bundle)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_bundle(path: &Path) -> Result<StatBundle> {
    let data = fs::read(path).map_err(|e| VerifError::Bundle {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&data).map_err(|e| VerifError::Bundle {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Directory of one initialization below `root`:
/// `<root>/<case>/<run>/<init>[/<grid>]`.
pub fn init_dir(root: &Path, case: &str, run: &str, init: &NaiveDateTime, grid: &str) -> PathBuf {
    let mut dir = root.join(case).join(run).join(format_cycle(init));
    if !grid.is_empty() {
        dir.push(grid);
    }
    dir
}

/// Bundle file of one initialization below `root`.
pub fn bundle_path(
    root: &Path,
    case: &str,
    run: &str,
    init: &NaiveDateTime,
    grid: &str,
    prefix: &str,
) -> PathBuf {
    init_dir(root, case, run, init, grid).join(format!("{}.json", prefix))
}

/// Ingests one initialization directory and writes its bundle to `out_dir`.
/// The bundle is only written when at least one frame was collected.
pub fn ingest_init(in_dir: &Path, out_dir: &Path, prefix: &str) -> Result<IngestOutcome> {
    let log = JobLog::create(&out_dir.join(INGEST_LOG))?;
    log.info(&format!("Ingesting {} tables from {}", prefix, in_dir.display()));

    let (bundle, files, skipped) = match collect_bundle(in_dir, prefix, &log) {
        Ok(collected) => collected,
        Err(e) => {
            log.warn(&e.to_string());
            return Err(e);
        }
    };

    let families: Vec<String> = bundle.keys().cloned().collect();
    let written = if bundle.is_empty() {
        log.warn(&format!("No frames collected from {}, bundle not written", in_dir.display()));
        None
    } else {
        let path = out_dir.join(format!("{}.json", prefix));
        write_bundle(&path, &bundle)?;
        log.info(&format!("Wrote {} families to {}", families.len(), path.display()));
        Some(path)
    };
    log.finish();

    Ok(IngestOutcome {
        files,
        skipped,
        families,
        bundle: written,
    })
}

/// One unit of ingest work.
#[derive(Debug, Clone)]
struct IngestTask {
    in_dir: PathBuf,
    out_dir: PathBuf,
}

/// Summary of an ingest run.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Runs every (configuration, member, grid, initialization) of `config` on a
/// worker pool. Tasks are independent; a failing task does not stop the
/// others, but the run reports the first failure once all have finished.
pub fn run_ingest(config: &IngestConfig, parallel: &ParallelConfig) -> Result<IngestSummary> {
    let cycles = config.inits.cycles()?;
    let mut tasks = Vec::new();
    for descriptor in &config.configurations {
        for member in descriptor.member_list() {
            let run = descriptor.run_name(&member);
            for grid in descriptor.grid_list() {
                for init in &cycles {
                    tasks.push(IngestTask {
                        in_dir: init_dir(&config.in_root, &config.case, &run, init, &grid),
                        out_dir: init_dir(&config.out_root, &config.case, &run, init, &grid),
                    });
                }
            }
        }
    }
    info!("Ingesting {} initialization directories", tasks.len());

    let pool = parallel.build_pool()?;
    let results: Vec<Result<IngestOutcome>> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| ingest_init(&task.in_dir, &task.out_dir, &config.prefix))
            .collect()
    });

    let mut summary = IngestSummary::default();
    let mut first_error = None;
    for (task, result) in tasks.iter().zip(results) {
        match result {
            Ok(outcome) => summary.written.extend(outcome.bundle),
            Err(e) => {
                error!("Ingest of {} failed: {}", task.in_dir.display(), e);
                summary.failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }
    info!(
        "Ingest finished: {} bundles written, {} failures",
        summary.written.len(),
        summary.failed
    );
    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}
