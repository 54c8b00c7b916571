use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::QueueError;

/// Counting gate that admits at most `capacity` holders at a time.
///
/// A slot is held for as long as the returned [`AdmissionPermit`] lives;
/// dropping the permit releases the slot and wakes one waiting task.
#[derive(Debug, Clone)]
pub struct AdmissionLimiter {
    sem: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted slot. Released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionLimiter {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            sem: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Waits until a slot is free and takes it.
    pub async fn acquire(&self) -> Result<AdmissionPermit, QueueError> {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| QueueError::Closed)?;
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Stops admitting. Pending and future [`acquire`](Self::acquire) calls
    /// fail with [`QueueError::Closed`]; permits already held stay valid.
    pub fn close(&self) {
        self.sem.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sem.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}
