//! External collaborator contracts
//!
//! The lock client never talks to a store directly. It pings it once through
//! `StoreConnection` and does everything else through `MutexService` and the
//! `DistributedMutex` objects it hands out. Retry, backoff and quorum rules
//! live behind these traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{MutexError, StoreError};
use crate::options::MutexOptions;

/// Liveness check for the backing store
#[async_trait]
pub trait StoreConnection: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Factory for named distributed mutexes
pub trait MutexService: Send + Sync {
    /// Build a mutex for `key`. Nothing is contacted until `lock` is called.
    fn new_mutex(&self, key: &str, options: &MutexOptions) -> Arc<dyn DistributedMutex>;
}

/// One named mutex on the external service
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Lock key
    fn name(&self) -> &str;

    /// Holder value of the last successful `lock`, empty before that.
    fn value(&self) -> String;

    /// Expiry configured for this mutex.
    fn expiry(&self) -> std::time::Duration;

    /// Acquire the lock, retrying per the mutex options.
    ///
    /// Returns `Ok(true)` when acquired. Contention after the last attempt is
    /// reported as `Ok(false)` or a contention error depending on the
    /// implementation; callers treat both as "not acquired".
    async fn lock(&self, deadline: Option<Instant>) -> Result<bool, MutexError>;

    /// Push the expiry forward. `Ok(false)` means this holder no longer owns
    /// the record.
    async fn extend(&self) -> Result<bool, MutexError>;

    /// Release the lock. `Ok(false)` means this holder did not own the record
    /// at release time.
    async fn unlock(&self, deadline: Option<Instant>) -> Result<bool, MutexError>;
}
