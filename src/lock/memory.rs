use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{Result, StoreError};
use crate::lock::{LockManager, LockOwner};

/// In-process lock table.
///
/// Ownership lives in a mutex-protected map from canonical key to owner;
/// waiters park on a notification that fires whenever any key is released.
#[derive(Debug)]
pub struct InMemoryLockManager {
    table: Mutex<HashMap<String, LockOwner>>,
    released: Notify,
    acquire_timeout: Option<Duration>,
}

/// Keys taken so far by one `acquire` call. Dropping it without `commit`
/// hands them back, which covers timeouts and cancelled futures alike.
struct PendingAcquisition<'a> {
    manager: &'a InMemoryLockManager,
    owner: &'a LockOwner,
    taken: Vec<String>,
    committed: bool,
}

impl PendingAcquisition<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingAcquisition<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.taken.is_empty() {
            debug!(
                "{} rolling back {} partially acquired lock(s)",
                self.owner,
                self.taken.len()
            );
            self.manager.release(self.owner, &self.taken);
        }
    }
}

impl InMemoryLockManager {
    /// Lock manager whose acquisitions wait indefinitely
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            released: Notify::new(),
            acquire_timeout: None,
        }
    }

    /// Lock manager whose whole `acquire` call is bounded by `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            acquire_timeout: Some(timeout),
            ..Self::new()
        }
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout
    }

    /// Wait for one key. Returns false if `owner` already held it.
    async fn acquire_one(&self, owner: &LockOwner, key: &str) -> bool {
        loop {
            // Register interest before inspecting the table so a release that
            // happens in between is not missed.
            let released = self.released.notified();
            {
                let mut table = self.table.lock();
                match table.entry(key.to_string()) {
                    Entry::Vacant(slot) => {
                        slot.insert(owner.clone());
                        return true;
                    }
                    Entry::Occupied(held) if held.get() == owner => return false,
                    Entry::Occupied(_) => {}
                }
            }
            released.await;
        }
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, owner: &LockOwner, keys: &[String]) -> Result<()> {
        let deadline = self.acquire_timeout.map(|timeout| Instant::now() + timeout);
        let mut pending = PendingAcquisition {
            manager: self,
            owner,
            taken: Vec::with_capacity(keys.len()),
            committed: false,
        };

        for key in keys {
            if pending.taken.contains(key) {
                continue;
            }
            let wait = self.acquire_one(owner, key);
            let newly_taken = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, wait).await.map_err(|_| {
                    warn!("{} timed out waiting for lock {}", owner, key);
                    StoreError::LockAcquisitionFailed {
                        reason: format!("timed out waiting for {}", key),
                    }
                })?,
                None => wait.await,
            };
            if newly_taken {
                pending.taken.push(key.clone());
            }
        }

        pending.commit();
        Ok(())
    }

    fn release(&self, owner: &LockOwner, keys: &[String]) {
        let mut released = 0;
        {
            let mut table = self.table.lock();
            for key in keys {
                let held_by_owner = table.get(key).map(|holder| holder == owner);
                match held_by_owner {
                    Some(true) => {
                        table.remove(key);
                        released += 1;
                    }
                    Some(false) => {
                        warn!("{} tried to release {} held by another owner", owner, key)
                    }
                    None => debug!("{} released {} which was not held", owner, key),
                }
            }
        }
        if released > 0 {
            self.released.notify_waiters();
        }
    }

    fn held_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.table.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let manager = InMemoryLockManager::new();
        let owner = LockOwner::new();
        manager.acquire(&owner, &keys(&["MODEL:a", "MODEL_SCHEMA:s"])).await.unwrap();
        assert_eq!(manager.held_keys(), keys(&["MODEL:a", "MODEL_SCHEMA:s"]));

        manager.release(&owner, &keys(&["MODEL:a", "MODEL_SCHEMA:s"]));
        assert!(manager.held_keys().is_empty());
    }

    #[tokio::test]
    async fn test_release_never_drops_another_owners_key() {
        let manager = InMemoryLockManager::new();
        let holder = LockOwner::new();
        let intruder = LockOwner::new();
        manager.acquire(&holder, &keys(&["MODEL:a"])).await.unwrap();

        manager.release(&intruder, &keys(&["MODEL:a", "MODEL:never-held"]));
        assert_eq!(manager.held_keys(), keys(&["MODEL:a"]));
    }

    #[tokio::test]
    async fn test_timeout_leaves_nothing_held() {
        let manager = InMemoryLockManager::with_timeout(Duration::from_millis(50));
        let holder = LockOwner::new();
        manager.acquire(&holder, &keys(&["MODEL:b"])).await.unwrap();

        // "MODEL:a" is free and taken first, then "MODEL:b" times out
        let other = LockOwner::new();
        let result = manager.acquire(&other, &keys(&["MODEL:a", "MODEL:b"])).await;
        assert!(matches!(result, Err(StoreError::LockAcquisitionFailed { .. })));
        assert_eq!(manager.held_keys(), keys(&["MODEL:b"]));
    }

    #[tokio::test]
    async fn test_cancelled_acquire_rolls_back() {
        let manager = InMemoryLockManager::new();
        let holder = LockOwner::new();
        manager.acquire(&holder, &keys(&["MODEL:b"])).await.unwrap();

        let other = LockOwner::new();
        let wanted = keys(&["MODEL:a", "MODEL:b"]);
        let attempt = manager.acquire(&other, &wanted);
        assert!(tokio::time::timeout(Duration::from_millis(50), attempt)
            .await
            .is_err());
        assert_eq!(manager.held_keys(), keys(&["MODEL:b"]));
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let manager = Arc::new(InMemoryLockManager::with_timeout(Duration::from_secs(5)));
        let first = LockOwner::new();
        manager.acquire(&first, &keys(&["MODEL:shared"])).await.unwrap();

        let waiter_manager = manager.clone();
        let waiter = tokio::spawn(async move {
            let second = LockOwner::new();
            waiter_manager
                .acquire(&second, &keys(&["MODEL:shared"]))
                .await
                .map(|_| second)
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        manager.release(&first, &keys(&["MODEL:shared"]));
        let second = waiter.await.unwrap().unwrap();
        assert_eq!(manager.held_keys(), keys(&["MODEL:shared"]));
        manager.release(&second, &keys(&["MODEL:shared"]));
        assert!(manager.held_keys().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_taken_once() {
        let manager = InMemoryLockManager::new();
        let owner = LockOwner::new();
        manager.acquire(&owner, &keys(&["MODEL:a", "MODEL:a"])).await.unwrap();
        assert_eq!(manager.held_keys(), keys(&["MODEL:a"]));
        manager.release(&owner, &keys(&["MODEL:a"]));
        assert!(manager.held_keys().is_empty());
    }
}
