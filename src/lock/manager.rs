use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// Identity of one unit of work holding locks.
///
/// A fresh owner is minted per coordinated operation, so a release can only
/// ever drop keys taken by that same operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockOwner(Uuid);

impl LockOwner {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

/// Grants and revokes exclusive ownership of canonical resource keys.
///
/// Implementations may be backed by an in-process table or a distributed lock
/// service; callers only rely on the contract below.
#[async_trait::async_trait]
pub trait LockManager: Send + Sync {
    /// Wait until `owner` exclusively holds every key in `keys`.
    ///
    /// Keys are taken in the order given. On failure (timeout or backend
    /// error) the call returns `LockAcquisitionFailed` and none of the keys
    /// taken by this call remain held.
    async fn acquire(&self, owner: &LockOwner, keys: &[String]) -> Result<()>;

    /// Release the keys held by `owner`. Keys held by another owner, or not
    /// held at all, are left untouched.
    ///
    /// Called from `LockGuard::drop`, so it must neither block nor fail. A
    /// remote backend should hand the release off (e.g. queue it to a
    /// background task) and rely on lease expiry if that hand-off is lost.
    fn release(&self, owner: &LockOwner, keys: &[String]);

    /// Snapshot of the currently held keys, sorted
    fn held_keys(&self) -> Vec<String>;
}
