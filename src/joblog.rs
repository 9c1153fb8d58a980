//! Per-job warning logs
//!
//! Ingest writes one log per initialization and concatenation one per run.
//! Each entry is also forwarded to the `log` facade so it shows up on the
//! console under the global filter.

use crate::errors::Result;
use chrono::Utc;
use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A job-scoped log file. Repeated runs replace the file.
pub struct JobLog {
    path: PathBuf,
    sink: Mutex<BufWriter<File>>,
    warnings: Mutex<usize>,
}

impl JobLog {
    /// Creates (or truncates) the log file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sink: Mutex::new(BufWriter::new(file)),
            warnings: Mutex::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        info!("{}", message);
        self.write_line("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", message);
        self.write_line("WARN", message);
        if let Ok(mut count) = self.warnings.lock() {
            *count += 1;
        }
    }

    /// Number of warnings written so far.
    pub fn warning_count(&self) -> usize {
        self.warnings.lock().map(|c| *c).unwrap_or(0)
    }

    /// Points the console at this file when the job recorded warnings.
    pub fn finish(&self) {
        let count = self.warning_count();
        if count > 0 {
            warn!("{} warning(s) recorded in {}", count, self.path().display());
        }
    }

    fn write_line(&self, level: &str, message: &str) {
        if let Ok(mut sink) = self.sink.lock() {
            // A failing log sink must not abort the job it documents.
            let _ = writeln!(
                sink,
                "{} {:<5} {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                level,
                message
            );
            let _ = sink.flush();
        }
    }
}
