//! Per-conversation turn serialization.
//!
//! Each channel key maps to a `Semaphore(1)`. The permit is held for the
//! whole turn; a message arriving mid-turn waits for it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Default)]
pub struct ConversationLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ConversationLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the turn lock of `channel_id`. Drop the permit to release.
    pub async fn acquire(&self, channel_id: &str) -> Result<OwnedSemaphorePermit, LockClosed> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(channel_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned().await.map_err(|_| LockClosed)
    }

    /// Number of tracked channels.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop locks nobody holds or waits on.
    ///
    /// A semaphore is idle when its permit is available and the map holds
    /// the only reference to it.
    pub fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, sem| sem.available_permits() == 0 || Arc::strong_count(sem) > 1);
        before - locks.len()
    }
}

/// The semaphore behind a conversation lock was closed.
#[derive(Debug, thiserror::Error)]
#[error("conversation lock closed")]
pub struct LockClosed;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_access() {
        let map = ConversationLockMap::new();
        drop(map.acquire("c1").await.unwrap());
        drop(map.acquire("c1").await.unwrap());
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn different_channels_run_concurrently() {
        let map = ConversationLockMap::new();
        let p1 = map.acquire("c1").await.unwrap();
        let p2 = map.acquire("c2").await.unwrap();
        assert_eq!(map.len(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn one_turn_in_flight_per_channel() {
        let map = Arc::new(ConversationLockMap::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (map, active, peak) = (map.clone(), active.clone(), peak.clone());
            handles.push(tokio::spawn(async move {
                let _permit = map.acquire("c1").await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = ConversationLockMap::new();
        let held = map.acquire("busy").await.unwrap();
        drop(map.acquire("idle").await.unwrap());
        assert_eq!(map.prune_idle(), 1);
        assert_eq!(map.len(), 1);
        drop(held);
        assert_eq!(map.prune_idle(), 1);
        assert!(map.is_empty());
    }
}
