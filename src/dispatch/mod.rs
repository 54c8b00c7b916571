//! Bounded-concurrency dispatch of fire-and-forget work units.
//!
//! [`DispatchQueue`] composes an [`AdmissionLimiter`] (how many units may run
//! at once) with a [`CompletionTracker`] (how many units are still
//! outstanding) and lets the caller wait for the queue to go quiet.

mod limiter;
mod queue;
mod tracker;

pub use limiter::{AdmissionLimiter, AdmissionPermit};
pub use queue::{DispatchQueue, UnitResult};
pub use tracker::{CompletionTracker, FinishGuard};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("dispatch capacity must be at least 1")]
    ZeroCapacity,

    #[error("admission gate is closed")]
    Closed,
}
