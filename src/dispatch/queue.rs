use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::limiter::AdmissionLimiter;
use super::tracker::CompletionTracker;
use super::QueueError;

/// Result of one work unit. Errors are logged by the queue and dropped.
pub type UnitResult = anyhow::Result<()>;

/// Runs submitted work units with at most `capacity` executing at once.
///
/// Submission never waits for a slot: each unit is spawned as its own Tokio
/// task which acquires an admission permit, runs, releases the permit and
/// only then reports itself finished. [`drain`](Self::drain) resolves once
/// every unit submitted so far has finished, including units submitted while
/// the drain was already waiting.
#[derive(Debug)]
pub struct DispatchQueue {
    limiter: AdmissionLimiter,
    tracker: Arc<CompletionTracker>,
    submitted: AtomicUsize,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Ok(Self {
            limiter: AdmissionLimiter::new(capacity)?,
            tracker: Arc::new(CompletionTracker::new()),
            submitted: AtomicUsize::new(0),
        })
    }

    /// Hands a unit to the queue. Must be called from within a Tokio runtime.
    pub fn submit<F>(&self, unit: F)
    where
        F: Future<Output = UnitResult> + Send + 'static,
    {
        // Counted before the task exists, so an immediate drain sees it.
        let finish = self.tracker.track();
        let seq = self.submitted.fetch_add(1, Ordering::Relaxed);
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            // Declared first so it drops last: the slot is always free again
            // by the time the unit counts as finished.
            let _finish = finish;

            let permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::debug!(unit = seq, error = %e, "queue closed, unit skipped");
                    return;
                }
            };
            let result = unit.await;
            drop(permit);

            if let Err(e) = result {
                tracing::warn!(unit = seq, error = %format!("{e:#}"), "work unit failed");
            }
        });
    }

    /// Waits until every submitted unit has finished.
    pub async fn drain(&self) {
        self.tracker.drain().await;
    }

    /// Stops admitting new units. Units already running finish normally;
    /// units still waiting for a slot, and any submitted afterwards, are
    /// skipped and count as finished, so [`drain`](Self::drain) still returns.
    pub fn close(&self) {
        self.limiter.close();
    }

    pub fn capacity(&self) -> usize {
        self.limiter.capacity()
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.in_flight()
    }

    /// Total number of units ever submitted.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }
}
