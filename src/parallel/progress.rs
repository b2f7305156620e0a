//! Shared progress counter and cooperative cancellation for a parity run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;

/// Run-level stop signal. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts completed fits across worker threads and logs every `log_every`.
#[derive(Debug)]
pub struct Progress {
    label: &'static str,
    total: usize,
    done: AtomicUsize,
    log_every: usize,
}

impl Progress {
    pub fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            done: AtomicUsize::new(0),
            log_every: (total / 10).max(1),
        }
    }

    /// Record `n` finished items; returns the running count.
    pub fn advance(&self, n: usize) -> usize {
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        let before = done - n;
        if done / self.log_every != before / self.log_every || done == self.total {
            info!(stage = self.label, done, total = self.total, "progress");
        }
        done
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
