//! Worker limit shared by every network-issuing component.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{HarvestError, Result};

/// Caps the number of concurrent proxy-bound operations.
///
/// Clones share the same permits, so the search scheduler, the liveness
/// prefilter and the content fetcher together never exceed `capacity`.
#[derive(Debug, Clone)]
pub struct WorkerLimit {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerLimit {
    /// Creates a limit with `capacity` permits (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free worker slot.
    ///
    /// Fails with [`HarvestError::Cancelled`] once the limit has been closed.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| HarvestError::Cancelled)
    }

    /// Refuses all pending and future acquisitions.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns whether the limit has been closed.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Total number of worker slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

impl Default for WorkerLimit {
    fn default() -> Self {
        Self::new(3)
    }
}
