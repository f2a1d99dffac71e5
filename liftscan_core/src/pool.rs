//! Fixed-size worker pool that scans repositories in parallel.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::Result;

/// Explicit rayon pool so scans do not compete with the global pool.
#[derive(Debug)]
pub struct ScanPool {
    pool: ThreadPool,
    workers: usize,
}

impl ScanPool {
    /// Start a pool with `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WorkerPool`] when the threads cannot be spawned.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("liftscan-worker-{index}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` once per item on the pool; results keep the input order.
    pub fn run<I, T, F>(&self, items: &[I], job: F) -> Vec<T>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync,
    {
        self.pool
            .install(|| items.par_iter().map(|item| job(item)).collect())
    }
}
