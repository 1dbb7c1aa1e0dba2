use itertools::Itertools;
use log::debug;
use std::future::Future;
use std::sync::Arc;

use crate::error::StoreError;
use crate::lock::{LockGuard, LockManager};
use crate::model::Entity;

/// Runs storage writes inside the lock window of the entity being written.
///
/// Cloning is cheap; all clones share the same lock manager.
#[derive(Clone)]
pub struct MutationCoordinator {
    locks: Arc<dyn LockManager>,
}

impl MutationCoordinator {
    pub fn new(locks: Arc<dyn LockManager>) -> Self {
        Self { locks }
    }

    pub fn lock_manager(&self) -> &Arc<dyn LockManager> {
        &self.locks
    }

    /// Lock everything `entity` depends on (plus itself once persisted), run
    /// `write`, then release.
    ///
    /// Keys are acquired in ascending canonical order so that overlapping lock
    /// sets can never wait on each other in a cycle. If acquisition fails the
    /// write is never started. The locks are released before this returns on
    /// every path, and `write`'s result is handed back unchanged.
    pub async fn perform<E, T, Err, F, Fut>(&self, entity: &E, write: F) -> Result<T, Err>
    where
        E: Entity + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Err>>,
        Err: From<StoreError>,
    {
        // BTreeSet iteration is already sorted by canonical string
        let keys: Vec<String> = entity
            .full_lock_set()?
            .iter()
            .map(|key| key.encode().to_string())
            .collect();
        debug!("acquiring [{}]", keys.iter().join(", "));

        let guard = LockGuard::acquire(self.locks.clone(), keys).await?;
        let result = write().await;
        drop(guard);

        result
    }
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator").finish_non_exhaustive()
    }
}
