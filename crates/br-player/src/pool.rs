//! Bounded pool for fire-and-forget background work.
//!
//! Cache persistence and prefetch run here so the foreground read path never
//! waits on them. A semaphore caps how many tasks run at once and a second
//! one caps how many may be admitted at all; submissions past that bound are
//! dropped. Queued tasks wait for a worker or for shutdown, whichever comes
//! first.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Tasks allowed to wait for a worker when none is given.
pub const DEFAULT_QUEUE: usize = 64;

pub struct BackgroundPool {
    workers: Arc<Semaphore>,
    slots: Arc<Semaphore>,
    capacity: usize,
    drained: Arc<Notify>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl BackgroundPool {
    pub fn new(workers: usize) -> Self {
        Self::bounded(workers, DEFAULT_QUEUE)
    }

    /// At most `workers` tasks run and at most `queue` more wait.
    pub fn bounded(workers: usize, queue: usize) -> Self {
        let capacity = workers + queue;
        Self {
            workers: Arc::new(Semaphore::new(workers)),
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            drained: Arc::new(Notify::new()),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Submit a task. Returns `false` if it was dropped because the pool is
    /// full or shut down. An accepted task is still dropped without running
    /// if the pool shuts down before a worker frees up.
    pub fn submit<F>(&self, name: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            tracing::debug!(task = name, "Pool is shut down, dropping task");
            return false;
        }
        let Ok(slot) = Arc::clone(&self.slots).try_acquire_owned() else {
            tracing::debug!(task = name, capacity = self.capacity, "Pool is full, dropping task");
            crate::metrics::background_task_dropped(name);
            return false;
        };

        let workers = Arc::clone(&self.workers);
        let slots = Arc::clone(&self.slots);
        let capacity = self.capacity;
        let drained = Arc::clone(&self.drained);
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            let permit = tokio::select! {
                permit = workers.acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => {
                    tracing::debug!(task = name, "Queued task cancelled");
                    None
                }
            };
            if let Some(_permit) = permit {
                task.await;
            }

            drop(slot);
            if slots.available_permits() == capacity {
                drained.notify_waiters();
            }
        });
        true
    }

    /// Tasks admitted and not yet finished, queued ones included.
    pub fn pending(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Stop accepting work, cancel queued tasks and wait for running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.cancel.cancel();
        self.tracker.wait().await;
        tracing::debug!("Background pool drained");
    }

    /// Wait until every admitted task has finished, without closing the pool.
    pub async fn idle(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            drained.await;
        }
    }
}

impl Default for BackgroundPool {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_submitted_tasks() {
        let pool = BackgroundPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = Arc::clone(&done);
            pool.submit("count", async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn caps_concurrency() {
        let pool = BackgroundPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit("sleep", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }
        pool.idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn drops_submissions_past_the_queue_bound() {
        let pool = BackgroundPool::bounded(1, 2);
        let gate = Arc::new(Notify::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let mut accepted = 0;
        for _ in 0..100 {
            let gate = Arc::clone(&gate);
            let ran = Arc::clone(&ran);
            let payload = vec![0u8; 1024];
            if pool.submit("held", async move {
                let _payload = payload;
                gate.notified().await;
                ran.fetch_add(1, Ordering::SeqCst);
            }) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(pool.pending(), 3);

        // Release the held tasks one at a time until the pool drains.
        while ran.load(Ordering::SeqCst) < 3 {
            gate.notify_one();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pool.idle().await;
        assert_eq!(pool.pending(), 0);
        assert!(pool.submit("after", async {}));
        pool.idle().await;
    }

    #[tokio::test]
    async fn idle_returns_at_once_when_empty() {
        let pool = BackgroundPool::new(1);
        tokio::time::timeout(Duration::from_millis(100), pool.idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_drops_later_submissions() {
        let pool = BackgroundPool::new(1);
        pool.shutdown().await;
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        let accepted = pool.submit("late", async move {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!accepted);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.pending(), 0);
    }
}
