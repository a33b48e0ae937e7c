//! Bounded worker pool for metric collection
//!
//! A semaphore enforces the concurrency ceiling: `submit` awaits a
//! permit before spawning, so a saturated pool applies backpressure to
//! the orchestrator by construction rather than through an explicit
//! queue-depth check. `drain` joins everything that was submitted,
//! bounded by an optional hard stop after which stragglers are
//! abandoned and reported to the caller as timed out.

use crate::error::ScanError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Default concurrency ceiling
pub const DEFAULT_WORKER_CEILING: usize = 10;

/// Outcome of draining the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Tasks that ran to completion
    pub completed: usize,
    /// True if the hard stop elapsed with work still in flight
    pub timed_out: bool,
}

/// Fixed-ceiling worker pool over tokio tasks
pub struct WorkerPool {
    limiter: Arc<Semaphore>,
    tasks: JoinSet<()>,
    ceiling: usize,
}

impl WorkerPool {
    pub fn new(ceiling: usize) -> Result<Self, ScanError> {
        if ceiling == 0 {
            return Err(ScanError::PoolInfrastructure(
                "worker ceiling must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            limiter: Arc::new(Semaphore::new(ceiling)),
            tasks: JoinSet::new(),
            ceiling,
        })
    }

    /// Submit one unit of work.
    ///
    /// Blocks (asynchronously) while the pool is at its ceiling. The
    /// permit is held for the lifetime of the task, so at most
    /// `ceiling` units ever run concurrently.
    pub async fn submit<F>(&mut self, work: F) -> Result<(), ScanError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ScanError::PoolInfrastructure(format!("semaphore closed: {}", e)))?;

        self.tasks.spawn(async move {
            work.await;
            drop(permit);
        });

        Ok(())
    }

    /// Number of units currently running
    pub fn in_flight(&self) -> usize {
        self.ceiling - self.limiter.available_permits()
    }

    /// Wait for all submitted work to complete.
    ///
    /// With a hard stop, waiting ends at that instant and any
    /// still-running tasks are aborted; the caller decides how to
    /// record the resources those tasks would have served.
    pub async fn drain(&mut self, hard_stop: Option<Instant>) -> DrainOutcome {
        let mut completed = 0;

        loop {
            let joined = match hard_stop {
                Some(deadline) => match timeout_at(deadline, self.tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            remaining = self.tasks.len(),
                            "Drain hard stop elapsed, abandoning in-flight work"
                        );
                        self.tasks.abort_all();
                        // Reap the aborted handles so the set is clean
                        while self.tasks.join_next().await.is_some() {}
                        return DrainOutcome {
                            completed,
                            timed_out: true,
                        };
                    }
                },
                None => self.tasks.join_next().await,
            };

            match joined {
                Some(Ok(())) => completed += 1,
                Some(Err(e)) => {
                    // A panicked worker loses its cache entry but does
                    // not poison the pool
                    warn!(error = %e, "Worker task failed to join");
                }
                None => {
                    debug!(completed, "Worker pool drained");
                    return DrainOutcome {
                        completed,
                        timed_out: false,
                    };
                }
            }
        }
    }
}
