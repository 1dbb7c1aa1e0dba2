use log::debug;
use std::sync::Arc;

use crate::error::Result;
use crate::lock::{LockManager, LockOwner};

/// Scoped ownership of a set of acquired keys.
///
/// The keys are released exactly once, when the guard is dropped: on normal
/// return, on error, on panic unwinding and when the owning future is
/// cancelled.
pub struct LockGuard {
    manager: Arc<dyn LockManager>,
    owner: LockOwner,
    keys: Vec<String>,
}

impl LockGuard {
    /// Acquire `keys` (already in acquisition order) under a fresh owner.
    pub async fn acquire(manager: Arc<dyn LockManager>, keys: Vec<String>) -> Result<Self> {
        let owner = LockOwner::new();
        manager.acquire(&owner, &keys).await?;
        debug!("{} acquired {} lock(s)", owner, keys.len());
        Ok(Self {
            manager,
            owner,
            keys,
        })
    }

    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.manager.release(&self.owner, &self.keys);
        debug!("{} released {} lock(s)", self.owner, self.keys.len());
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("owner", &self.owner)
            .field("keys", &self.keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::InMemoryLockManager;

    #[tokio::test]
    async fn test_drop_releases_keys() {
        let manager: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
        {
            let guard = LockGuard::acquire(
                manager.clone(),
                vec!["MODEL:a".to_string(), "MODEL:b".to_string()],
            )
            .await
            .unwrap();
            assert_eq!(guard.keys().len(), 2);
            assert_eq!(manager.held_keys(), vec!["MODEL:a", "MODEL:b"]);
        }
        assert!(manager.held_keys().is_empty());
    }

    #[tokio::test]
    async fn test_panic_inside_scope_still_releases() {
        let manager: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
        let task_manager = manager.clone();
        let result = tokio::spawn(async move {
            let _guard = LockGuard::acquire(task_manager, vec!["FEATURE:f".to_string()])
                .await
                .unwrap();
            panic!("write blew up");
        })
        .await;
        assert!(result.is_err());
        assert!(manager.held_keys().is_empty());
    }
}
