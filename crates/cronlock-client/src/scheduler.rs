//! Contract between the lock client and a job scheduler
//!
//! Schedulers hold a `dyn DistributedLocker`, lock the job key before each
//! run and unlock after it. An acquisition error means another node owns the
//! run and the scheduler should skip it.

use std::future::Future;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LockResult;
use crate::lock::Lock;
use crate::locker::Locker;

/// Something that can lock a job key
#[async_trait]
pub trait DistributedLocker: Send + Sync {
    async fn lock(&self, key: &str) -> LockResult<Box<dyn DistributedLock>>;
}

/// A held job lock
#[async_trait]
pub trait DistributedLock: Send + Sync {
    async fn unlock(&self) -> LockResult<()>;
}

#[async_trait]
impl DistributedLocker for Locker {
    async fn lock(&self, key: &str) -> LockResult<Box<dyn DistributedLock>> {
        let lock = Locker::lock(self, key).await?;
        Ok(Box::new(lock))
    }
}

#[async_trait]
impl DistributedLock for Lock {
    async fn unlock(&self) -> LockResult<()> {
        self.release().await.map(|_| ())
    }
}

/// Run `task` while holding `key`.
///
/// Returns `Ok(None)` when another holder owns the key. Errors releasing the
/// lock are returned even though the task ran, since the run may not have been
/// exclusive.
pub async fn run_exclusive<F, Fut, T>(
    locker: &dyn DistributedLocker,
    key: &str,
    task: F,
) -> LockResult<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let lock = match locker.lock(key).await {
        Ok(lock) => lock,
        Err(e) if e.is_acquisition() => {
            debug!(key = %key, "Job owned by another node, skipping run");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let output = task().await;
    lock.unlock().await?;
    Ok(Some(output))
}
