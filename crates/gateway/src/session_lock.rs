//! Per-session concurrency guard: serializes requests against the same
//! `session_id` without blocking requests against other sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore_for(&self, session_id: &str) -> Arc<Semaphore> {
        let mut locks = self.locks.lock();
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Wait for exclusive access to `session_id`. Blocks the calling task
    /// (not the process) until any in-flight request for the same session
    /// finishes.
    pub async fn acquire(&self, session_id: &str) -> OwnedSemaphorePermit {
        let sem = self.semaphore_for(session_id);
        sem.acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop semaphores with no held permits — called periodically so the
    /// map doesn't grow unbounded across many distinct sessions.
    pub fn prune_idle(&self) {
        self.locks
            .lock()
            .retain(|_, sem| sem.available_permits() == 0);
    }
}

/// Spawn the background task that calls [`SessionLockMap::prune_idle`] every
/// [`PRUNE_INTERVAL`], forever.
pub fn spawn_pruner(locks: Arc<SessionLockMap>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            locks.prune_idle();
        }
    });
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn sequential_access() {
        let map = SessionLockMap::new();
        let _p1 = map.acquire("s1").await;
        drop(_p1);
        let _p2 = map.acquire("s1").await;
    }

    #[tokio::test]
    async fn different_sessions_concurrent() {
        let map = Arc::new(SessionLockMap::new());
        let _p1 = map.acquire("s1").await;
        let _p2 = map.acquire("s2").await;
    }

    #[tokio::test]
    async fn same_session_waits() {
        let map = Arc::new(SessionLockMap::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let permit = map.acquire("s1").await;

        let map2 = map.clone();
        let counter2 = counter.clone();
        let handle = tokio::spawn(async move {
            let _p = map2.acquire("s1").await;
            counter2.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0, "waiter should still be blocked");

        drop(permit);
        handle.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prune_idle_removes_unheld_locks() {
        let map = SessionLockMap::new();
        {
            let locks = map.locks.lock();
            drop(locks);
        }
        let rt = tokio::runtime::Runtime::new().unwrap();
        let permit = rt.block_on(map.acquire("s1"));
        assert_eq!(map.session_count(), 1);
        drop(permit);
        map.prune_idle();
        assert_eq!(map.session_count(), 0);
    }
}
