//! Lock handle returned by a successful acquisition
//!
//! A handle moves through `Held` -> `Releasing` -> `Released` exactly once.
//! Release closes the renewal task's cancellation signal before contacting
//! the service, so a renewal racing the release cannot extend a lock that is
//! about to be dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use cronlock_api::{DistributedMutex, MutexError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{LockError, LockResult};
use crate::metrics;
use crate::renewal::{RenewalReport, RenewalTask};

const HELD: u8 = 0;
const RELEASING: u8 = 1;
const RELEASED: u8 = 2;

/// Lifecycle state of a lock handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Held,
    Releasing,
    Released,
}

impl LockState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            HELD => LockState::Held,
            RELEASING => LockState::Releasing,
            _ => LockState::Released,
        }
    }
}

/// Result of a release call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// The lock was held until release and is now free.
    Released,
    /// The handle had already been released; nothing was sent to the service.
    AlreadyReleased,
}

/// One acquired lock on one key
pub struct Lock {
    mutex: Arc<dyn DistributedMutex>,
    auto_extend: Duration,
    state: AtomicU8,
    renewal: Option<RenewalTask>,
    wait_for_renewal: bool,
    release_timeout: Option<Duration>,
    acquired_at: Instant,
}

impl Lock {
    pub(crate) fn new(
        mutex: Arc<dyn DistributedMutex>,
        auto_extend: Duration,
        wait_for_renewal: bool,
        release_timeout: Option<Duration>,
    ) -> Self {
        let renewal = (!auto_extend.is_zero())
            .then(|| RenewalTask::spawn(mutex.clone(), auto_extend));
        Self {
            mutex,
            auto_extend,
            state: AtomicU8::new(HELD),
            renewal,
            wait_for_renewal,
            release_timeout,
            acquired_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &str {
        self.mutex.name()
    }

    /// Holder value identifying this acquisition on the service
    pub fn value(&self) -> String {
        self.mutex.value()
    }

    pub fn state(&self) -> LockState {
        LockState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn auto_extend(&self) -> Duration {
        self.auto_extend
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Whether a renewal task is still extending this lock.
    pub fn is_renewing(&self) -> bool {
        self.renewal.as_ref().is_some_and(RenewalTask::is_running)
    }

    /// Release using the configured release timeout.
    pub async fn release(&self) -> LockResult<ReleaseStatus> {
        self.release_within(self.release_timeout).await
    }

    /// Release with an explicit deadline for the unlock call.
    ///
    /// A call after a completed release returns
    /// `ReleaseStatus::AlreadyReleased` without contacting the service. A
    /// release that was cancelled midway leaves the handle `Releasing`; the
    /// next call sends the unlock again.
    pub async fn release_within(&self, timeout: Option<Duration>) -> LockResult<ReleaseStatus> {
        if let Err(current) =
            self.state
                .compare_exchange(HELD, RELEASING, Ordering::AcqRel, Ordering::Acquire)
        {
            if current == RELEASED {
                debug!(key = %self.key(), "Lock already released");
                return Ok(ReleaseStatus::AlreadyReleased);
            }
            debug!(key = %self.key(), "Resuming interrupted release");
        }

        // Stop renewal before the unlock call goes out.
        if let Some(renewal) = &self.renewal {
            renewal.cancel();
            if self.wait_for_renewal
                && let Some(report) = renewal.join().await
            {
                log_renewal(self.key(), &report);
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let result = self.mutex.unlock(deadline).await;

        let key = self.key().to_string();
        // A concurrent release that finished first already deleted the record.
        if !self.close() && matches!(result, Ok(false)) {
            return Ok(ReleaseStatus::AlreadyReleased);
        }

        match result {
            Ok(true) => {
                metrics::record_release(&key, true);
                debug!(key = %key, held_ms = self.held_for().as_millis() as u64, "Lock released");
                Ok(ReleaseStatus::Released)
            }
            Ok(false) => {
                metrics::record_release(&key, false);
                warn!(key = %key, "Lock was no longer held at release");
                Err(LockError::Release {
                    source: MutexError::NotHeld(key.clone()),
                    key,
                })
            }
            Err(e) => {
                metrics::record_release(&key, false);
                warn!(key = %key, error = %e, "Lock release failed");
                Err(LockError::Release { key, source: e })
            }
        }
    }

    /// Move `Releasing` to `Released`, closing the handle exactly once.
    fn close(&self) -> bool {
        let closed = self
            .state
            .compare_exchange(RELEASING, RELEASED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if closed {
            metrics::record_handle_closed();
        }
        closed
    }
}

fn log_renewal(key: &str, report: &RenewalReport) {
    debug!(
        key = %key,
        exit = ?report.exit,
        extensions = report.extensions,
        "Renewal task stopped"
    );
}

impl Drop for Lock {
    fn drop(&mut self) {
        let state = self.state();
        if state == LockState::Released {
            return;
        }
        if let Some(renewal) = &self.renewal {
            renewal.cancel();
        }
        metrics::record_handle_closed();
        if state == LockState::Releasing {
            warn!(key = %self.key(), "Lock dropped during an unfinished release, it will expire on its own");
        } else {
            warn!(key = %self.key(), "Lock dropped without release, it will expire on its own");
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key())
            .field("state", &self.state())
            .field("auto_extend", &self.auto_extend)
            .finish()
    }
}
