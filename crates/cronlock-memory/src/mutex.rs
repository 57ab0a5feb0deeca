// Single-node distributed mutex over MemoryStore
// Validity of an acquisition is start + expiry - elapsed - drift, so a slow
// round-trip shortens the window instead of silently extending it.

use std::time::Duration;

use async_trait::async_trait;
use cronlock_api::{DistributedMutex, MutexConfig, MutexError, StoreError};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::store::MemoryStore;

/// Mutex handed out by `MemoryStore::new_mutex`
pub struct MemoryMutex {
    store: MemoryStore,
    name: String,
    config: MutexConfig,
    value: Mutex<String>,
    until: Mutex<Option<Instant>>,
}

impl MemoryMutex {
    pub(crate) fn new(store: MemoryStore, name: &str, config: MutexConfig) -> Self {
        Self {
            store,
            name: name.to_string(),
            config,
            value: Mutex::new(String::new()),
            until: Mutex::new(None),
        }
    }

    /// Local estimate of when the current acquisition stops being valid
    pub fn until(&self) -> Option<Instant> {
        *self.until.lock()
    }

    /// Budget for one store call: the per-operation timeout, capped by the
    /// caller's deadline.
    fn op_budget(&self, deadline: Option<Instant>) -> Result<Duration, MutexError> {
        let budget = self.config.op_timeout();
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(MutexError::Timeout);
                }
                Ok(budget.min(remaining))
            }
            None => Ok(budget),
        }
    }

    async fn bounded<T, F>(&self, deadline: Option<Instant>, op: F) -> Result<T, MutexError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let budget = self.op_budget(deadline)?;
        match tokio::time::timeout(budget, op).await {
            Ok(result) => result.map_err(MutexError::from),
            Err(_) => Err(MutexError::Store(StoreError::Timeout)),
        }
    }

    /// Remaining validity after an operation that started at `start`.
    fn validity(&self, start: Instant) -> Option<Instant> {
        let now = Instant::now();
        let elapsed = now - start;
        let valid_for = self
            .config
            .expiry
            .checked_sub(elapsed + self.config.drift())?;
        let until = now + valid_for;
        (now < until).then_some(until)
    }
}

#[async_trait]
impl DistributedMutex for MemoryMutex {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> String {
        self.value.lock().clone()
    }

    fn expiry(&self) -> Duration {
        self.config.expiry
    }

    async fn lock(&self, deadline: Option<Instant>) -> Result<bool, MutexError> {
        self.config.validate()?;
        let value = self.config.next_value().map_err(MutexError::Value)?;
        let mut last_err = MutexError::Failed(self.name.clone());

        for attempt in 0..self.config.tries {
            if attempt > 0 {
                let delay = self.config.retry_delay.delay_for(attempt);
                if let Some(deadline) = deadline
                    && Instant::now() + delay >= deadline
                {
                    return Err(MutexError::Timeout);
                }
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            match self
                .bounded(
                    deadline,
                    self.store.set_nx(&self.name, &value, self.config.expiry),
                )
                .await
            {
                Ok(true) => {
                    if let Some(until) = self.validity(start) {
                        *self.value.lock() = value;
                        *self.until.lock() = Some(until);
                        debug!(key = %self.name, attempt, "Mutex acquired");
                        return Ok(true);
                    }
                    // Acquired too late to be useful; give the record back.
                    let _ = self.store.delete_if(&self.name, &value).await;
                    last_err = MutexError::Failed(self.name.clone());
                }
                Ok(false) => {
                    trace!(key = %self.name, attempt, "Mutex taken");
                    last_err = MutexError::Taken(self.name.clone());
                }
                Err(MutexError::Timeout) => return Err(MutexError::Timeout),
                Err(e) => {
                    trace!(key = %self.name, attempt, error = %e, "Mutex acquire attempt failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn extend(&self) -> Result<bool, MutexError> {
        let value = self.value();
        if value.is_empty() {
            return Ok(false);
        }

        let start = Instant::now();
        let touched = self
            .bounded(None, self.store.touch(&self.name, &value, self.config.expiry))
            .await?;
        if !touched {
            return Ok(false);
        }

        match self.validity(start) {
            Some(until) => {
                *self.until.lock() = Some(until);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unlock(&self, deadline: Option<Instant>) -> Result<bool, MutexError> {
        let value = self.value();
        if value.is_empty() {
            return Ok(false);
        }

        let released = self
            .bounded(deadline, self.store.delete_if(&self.name, &value))
            .await?;
        if released {
            *self.until.lock() = None;
        }
        Ok(released)
    }
}
