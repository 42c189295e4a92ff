//! The single-writer gate.
//!
//! Every write path acquires the gate before touching the engine.
//! Waiters are served in arrival order; nothing is retried. How long
//! writers queued is recorded so callers can watch contention.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Writer wait statistics since creation or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Completed acquisitions.
    pub acquisitions: u64,
    /// Time spent queued, summed over all acquisitions.
    pub total_wait: Duration,
    /// Longest single wait.
    pub max_wait: Duration,
    /// Writers queued right now.
    pub waiting: usize,
}

impl WriterStats {
    /// Average wait per acquisition.
    #[must_use]
    pub fn mean_wait(&self) -> Duration {
        match u32::try_from(self.acquisitions) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_wait / n,
            Err(_) => self.total_wait / u32::MAX,
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    acquisitions: u64,
    total_wait: Duration,
    max_wait: Duration,
}

/// FIFO gate granting the writer role to one holder at a time.
#[derive(Debug, Default)]
pub struct WriterGate {
    lock: Arc<AsyncMutex<()>>,
    waiting: AtomicUsize,
    totals: Mutex<Totals>,
}

/// Proof of holding the writer role. Dropping it releases the gate.
#[derive(Debug)]
pub struct WriterPermit {
    _guard: OwnedMutexGuard<()>,
    waited: Duration,
}

impl WriterPermit {
    /// How long this permit queued before it was granted.
    #[must_use]
    pub const fn waited(&self) -> Duration {
        self.waited
    }
}

/// Keeps the queue length honest even if an acquisition is cancelled.
struct Queued<'a>(&'a AtomicUsize);

impl<'a> Queued<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WriterGate {
    /// Creates an idle gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the writer role.
    pub async fn acquire(&self) -> WriterPermit {
        let started = Instant::now();
        let guard = {
            let _queued = Queued::enter(&self.waiting);
            Arc::clone(&self.lock).lock_owned().await
        };
        let waited = started.elapsed();
        {
            let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
            totals.acquisitions += 1;
            totals.total_wait += waited;
            totals.max_wait = totals.max_wait.max(waited);
        }
        debug!(waited = ?waited, "writer acquired");
        WriterPermit {
            _guard: guard,
            waited,
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
        let totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        WriterStats {
            acquisitions: totals.acquisitions,
            total_wait: totals.total_wait,
            max_wait: totals.max_wait,
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }

    /// Clears the accumulated counters. Queued writers stay queued.
    pub fn reset(&self) {
        *self.totals.lock().unwrap_or_else(PoisonError::into_inner) = Totals::default();
    }
}
