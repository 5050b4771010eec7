//! Per-user concurrency control.
//!
//! Only one turn, mode switch or clear runs per user at a time. A second
//! update from the same user waits until the first releases its permit;
//! updates from different users never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use pr_domain::UserId;

/// Each user id maps to a `Semaphore(1)`. Holding the permit grants
/// exclusive access to that user's conversation.
pub struct UserLockMap {
    locks: Mutex<HashMap<UserId, Arc<Semaphore>>>,
}

impl Default for UserLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl UserLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for a user, waiting for any in-flight operation to
    /// finish. The permit releases on drop.
    pub async fn acquire(&self, user_id: UserId) -> Result<OwnedSemaphorePermit, LockClosed> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }

        tracing::debug!(user_id, "user busy, waiting for in-flight turn");
        sem.acquire_owned().await.map_err(|_| LockClosed(user_id))
    }

    /// Number of tracked users (for monitoring).
    pub fn user_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks that nobody holds or is about to acquire. A caller between
    /// cloning the semaphore and taking its permit still counts as a holder.
    pub fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1 || sem.available_permits() == 0);
        before - locks.len()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("lock for user {0} was closed")]
pub struct LockClosed(pub UserId);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_access() {
        let map = UserLockMap::new();

        let permit1 = map.acquire(1).await.unwrap();
        drop(permit1);

        let permit2 = map.acquire(1).await.unwrap();
        drop(permit2);
    }

    #[tokio::test]
    async fn different_users_concurrent() {
        let map = UserLockMap::new();

        let p1 = map.acquire(1).await.unwrap();
        let p2 = map.acquire(2).await.unwrap();
        assert_eq!(map.user_count(), 2);

        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_user_waits_for_release() {
        let map = Arc::new(UserLockMap::new());
        let released = Arc::new(AtomicBool::new(false));

        let p1 = map.acquire(7).await.unwrap();

        let handle = {
            let map = map.clone();
            let released = released.clone();
            tokio::spawn(async move {
                let _p2 = map.acquire(7).await.unwrap();
                released.load(Ordering::SeqCst)
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        released.store(true, Ordering::SeqCst);
        drop(p1);

        assert!(handle.await.unwrap(), "waiter ran before the holder released");
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let map = UserLockMap::new();
        let held = map.acquire(1).await.unwrap();
        drop(map.acquire(2).await.unwrap());

        assert_eq!(map.prune_idle(), 1);
        assert_eq!(map.user_count(), 1);
        drop(held);
    }

    #[tokio::test]
    async fn prune_keeps_locks_with_pending_acquirers() {
        let map = UserLockMap::new();
        drop(map.acquire(3).await.unwrap());

        // A caller that cloned the semaphore but has not taken the permit yet.
        let pending = map.locks.lock().get(&3).cloned().unwrap();
        assert_eq!(map.prune_idle(), 0);

        let permit = pending.clone().try_acquire_owned().unwrap();
        let acquired = tokio::time::timeout(Duration::from_millis(50), map.acquire(3)).await;
        assert!(acquired.is_err(), "second holder got a fresh semaphore");

        drop(permit);
        drop(pending);
        assert_eq!(map.prune_idle(), 1);
    }
}
