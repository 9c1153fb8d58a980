//! Parallel processing configuration and management
//!
//! Ingest fans out over forecast initializations. Each task reads its own
//! ASCII tables and writes its own bundle, so the only shared resource is the
//! thread pool configured here.

use crate::errors::{Result, VerifError};
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Number of workers this configuration resolves to
    pub fn worker_count(&self) -> usize {
        self.num_threads.unwrap_or_else(default_worker_count).max(1)
    }

    /// Build a dedicated pool for one job
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let workers = self.worker_count();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gsvis-worker-{}", i))
            .build()
            .map_err(|e| {
                VerifError::ThreadPoolError(format!(
                    "Failed to initialize thread pool with {} threads: {}",
                    workers, e
                ))
            })?;
        info!("Configured worker pool with {} threads", workers);
        Ok(pool)
    }
}

/// Host CPU count minus one, never less than one.
pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
