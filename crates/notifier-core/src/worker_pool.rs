//! Bounded-concurrency worker pool for per-event delivery tasks.
//!
//! A thin semaphore gate over `tokio::spawn`: submission acquires a permit
//! (waiting when the pool is saturated), the task releases it on completion.
//! Task panics are contained by the returned [`JoinHandle`] and never affect
//! other tasks or the pool itself.
//!
//! Only per-event work goes through the pool. Group fan-out stays inline on
//! the consumer task, so a saturated pool can never deadlock on nested
//! submissions.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Default maximum number of concurrently running tasks.
pub const DEFAULT_CAPACITY: usize = 50;

/// Semaphore-bounded task executor.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool running at most `capacity` tasks concurrently.
    ///
    /// A capacity of zero is clamped to one; a pool that can never run a
    /// task would block every submission forever.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Submit a task, waiting for a free slot when the pool is saturated.
    ///
    /// Returns the task's [`JoinHandle`]; callers that need batch completion
    /// await the collected handles. A panicking task surfaces as a
    /// [`JoinError`](tokio::task::JoinError) on its own handle only.
    pub async fn submit<F>(&self, task: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");

        tokio::spawn(async move {
            let _permit = permit;
            task.await;
        })
    }

    /// Configured maximum concurrency.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Currently free slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
