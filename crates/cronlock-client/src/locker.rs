//! Lock factory
//!
//! A `Locker` is built once per process against a backing store and shared by
//! every caller. It pings the store at construction, merges its configured
//! acquisition options with per-call overrides, and hands out `Lock` handles
//! with an auto-extend task attached when configured.

use std::sync::Arc;
use std::time::Duration;

use cronlock_api::{MutexError, MutexOptions, MutexService, StoreConnection};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{LockError, LockResult};
use crate::lock::Lock;
use crate::metrics;
use crate::settings::LockerSettings;

/// Factory for distributed lock handles
#[derive(Clone)]
pub struct Locker {
    service: Arc<dyn MutexService>,
    settings: Arc<LockerSettings>,
}

/// A locker together with the outcome of its construction-time ping.
///
/// In strict mode `ping` is always `Ok`; otherwise it carries the
/// connectivity error for the caller to inspect.
pub struct Connected {
    pub locker: Locker,
    pub ping: LockResult<()>,
}

impl Connected {
    pub fn is_healthy(&self) -> bool {
        self.ping.is_ok()
    }

    pub fn into_locker(self) -> Locker {
        self.locker
    }
}

impl Locker {
    /// Ping `store` and build a locker on top of it.
    ///
    /// With `settings.strict`, a failed ping aborts with
    /// `LockError::Connection`. Without it, construction always succeeds and
    /// the ping result is returned alongside the locker.
    pub async fn connect<S>(store: Arc<S>, settings: LockerSettings) -> LockResult<Connected>
    where
        S: StoreConnection + MutexService + 'static,
    {
        let ping = match store.ping().await {
            Ok(()) => Ok(()),
            Err(e) if settings.strict => {
                error!(error = %e, "Backing store unreachable");
                return Err(LockError::Connection(e));
            }
            Err(e) => {
                warn!(error = %e, "Backing store unreachable, continuing in non-strict mode");
                Err(LockError::Connection(e))
            }
        };

        info!(
            auto_extend_ms = settings.auto_extend.as_millis() as u64,
            strict = settings.strict,
            "Locker initialized"
        );

        Ok(Connected {
            locker: Locker {
                service: store,
                settings: Arc::new(settings),
            },
            ping,
        })
    }

    pub fn settings(&self) -> &LockerSettings {
        &self.settings
    }

    pub fn auto_extend(&self) -> Duration {
        self.settings.auto_extend
    }

    /// Acquire `key` with the locker's configured options.
    pub async fn lock(&self, key: &str) -> LockResult<Lock> {
        self.lock_with(key, &MutexOptions::default(), None).await
    }

    /// Acquire `key`, overlaying `overrides` on the configured options.
    ///
    /// `deadline` is passed to the service as-is; retries and per-attempt
    /// timeouts are the service's business.
    pub async fn lock_with(
        &self,
        key: &str,
        overrides: &MutexOptions,
        deadline: Option<Instant>,
    ) -> LockResult<Lock> {
        if key.is_empty() {
            return Err(LockError::Acquisition {
                key: String::new(),
                source: MutexError::Invalid("lock key must not be empty".to_string()),
            });
        }

        let options = self.settings.options.merge(overrides);
        let mutex = self.service.new_mutex(key, &options);

        let source = match mutex.lock(deadline).await {
            Ok(true) => None,
            Ok(false) => Some(MutexError::Failed(key.to_string())),
            Err(e) => Some(e),
        };
        if let Some(source) = source {
            metrics::record_acquire(key, false);
            debug!(key = %key, error = %source, "Lock not obtained");
            return Err(LockError::Acquisition {
                key: key.to_string(),
                source,
            });
        }

        let auto_extend = self.settings.auto_extend;
        if !auto_extend.is_zero() && auto_extend >= mutex.expiry() {
            warn!(
                key = %key,
                auto_extend_ms = auto_extend.as_millis() as u64,
                expiry_ms = mutex.expiry().as_millis() as u64,
                "Auto-extend period is not shorter than the lock expiry"
            );
        }

        metrics::record_acquire(key, true);
        debug!(key = %key, "Lock acquired");

        Ok(Lock::new(
            mutex,
            auto_extend,
            self.settings.wait_for_renewal,
            self.settings.release_timeout,
        ))
    }
}
