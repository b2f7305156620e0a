//! Rayon thread pool configuration for the compare stage.
//!
//! Use [WorkerPool::install] to run per-fit engine work with a fixed number of
//! threads, or rely on Rayon's default (all CPU cores).

use rayon::ThreadPoolBuilder;

use crate::error::HarnessError;

/// Configures how many worker threads resolve fits in parallel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use the global Rayon pool.
    pub workers: usize,
}

impl WorkerPool {
    /// Use exactly `n` worker threads.
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Run a closure on a thread pool with this worker count. If [workers](WorkerPool::workers)
    /// is 0, runs on the global Rayon pool. Otherwise builds a temporary pool.
    pub fn install<F, R>(&self, f: F) -> Result<R, HarnessError>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.workers == 0 {
            return Ok(f());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("dogma-worker-{index}"))
            .build()
            .map_err(|err| HarnessError::WorkerPool(err.to_string()))?;
        Ok(pool.install(f))
    }
}
