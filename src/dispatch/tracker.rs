use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts units that were submitted but have not finished yet and wakes
/// drainers whenever that count falls to zero.
///
/// The wake signal is not sticky: a drainer that arrives after the last
/// unit finished sees `in_flight == 0` and returns without waiting, and a
/// drainer that arrives earlier registers with the [`Notify`] *before* it
/// reads the counter, so a concurrent transition to zero cannot slip in
/// between the check and the wait.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    in_flight: AtomicUsize,
    idle: Notify,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly submitted unit. Call before the unit is scheduled.
    pub fn on_submit(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a finished unit. Must pair with exactly one [`on_submit`](Self::on_submit).
    pub fn on_finish(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "on_finish without a matching on_submit");
        if prev == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Calls [`on_submit`](Self::on_submit) and returns a guard that calls
    /// [`on_finish`](Self::on_finish) when dropped, whichever way the unit ends.
    pub fn track(self: &Arc<Self>) -> FinishGuard {
        self.on_submit();
        FinishGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once no unit is in flight.
    pub async fn drain(&self) {
        loop {
            let mut notified = pin!(self.idle.notified());
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
            // Units submitted after the wake keep the episode open.
        }
    }
}

/// Finish accounting for one submitted unit.
#[derive(Debug)]
pub struct FinishGuard {
    tracker: Arc<CompletionTracker>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.tracker.on_finish();
    }
}
