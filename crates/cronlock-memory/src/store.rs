// In-memory TTL store backing the distributed mutex
// Records expire lazily on access; an optional background task purges them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use cronlock_api::{DistributedMutex, MutexOptions, MutexService, StoreConnection, StoreError};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::{Instant, interval};
use tracing::{debug, info};

use crate::mutex::MemoryMutex;

/// A held record
struct Record {
    value: String,
    expires_at: Instant,
}

impl Record {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct StatsCollector {
    acquired: AtomicU64,
    contended: AtomicU64,
    extended: AtomicU64,
    extend_rejected: AtomicU64,
    released: AtomicU64,
    release_rejected: AtomicU64,
}

/// Point-in-time operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub acquired: u64,
    pub contended: u64,
    pub extended: u64,
    pub extend_rejected: u64,
    pub released: u64,
    pub release_rejected: u64,
}

pub(crate) struct StoreInner {
    records: DashMap<String, Record>,
    available: AtomicBool,
    latency: RwLock<Duration>,
    stats: StatsCollector,
}

/// In-process backing store shared by any number of lock factories.
///
/// Cloning is cheap; clones see the same records.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                records: DashMap::new(),
                available: AtomicBool::new(true),
                latency: RwLock::new(Duration::ZERO),
                stats: StatsCollector::default(),
            }),
        }
    }

    /// Simulated round-trip latency applied to every operation.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.write() = latency;
    }

    /// Toggle availability. While unavailable every operation, including
    /// `ping`, fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
        info!(available, "Memory store availability changed");
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Current holder value of `key`, if a live record exists.
    pub fn holder(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.inner
            .records
            .get(key)
            .filter(|r| !r.is_expired(now))
            .map(|r| r.value.clone())
    }

    /// Remaining time-to-live of `key`, if a live record exists.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .records
            .get(key)
            .filter(|r| !r.is_expired(now))
            .map(|r| r.expires_at - now)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .records
            .iter()
            .filter(|r| !r.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let s = &self.inner.stats;
        StoreStats {
            acquired: s.acquired.load(Ordering::Relaxed),
            contended: s.contended.load(Ordering::Relaxed),
            extended: s.extended.load(Ordering::Relaxed),
            extend_rejected: s.extend_rejected.load(Ordering::Relaxed),
            released: s.released.load(Ordering::Relaxed),
            release_rejected: s.release_rejected.load(Ordering::Relaxed),
        }
    }

    /// Remove expired records, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        purge(&self.inner)
    }

    /// Start a background task purging expired records every `period`.
    ///
    /// The task stops on its own once every clone of the store is dropped.
    pub fn spawn_cleanup(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Memory store dropped, stopping cleanup task");
                    break;
                };
                let purged = purge(&inner);
                if purged > 0 {
                    debug!(count = purged, "Cleaned up expired lock records");
                }
            }
        })
    }

    async fn round_trip(&self) -> Result<(), StoreError> {
        let latency = *self.inner.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if !self.is_available() {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    /// Create `key` with `value` unless a live record exists.
    pub(crate) async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.round_trip().await?;
        let now = Instant::now();
        let mut entry = self
            .inner
            .records
            .entry(key.to_string())
            .or_insert_with(|| Record {
                value: String::new(),
                expires_at: now,
            });
        if !entry.is_expired(now) {
            self.inner.stats.contended.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }
        entry.value = value.to_string();
        entry.expires_at = now + ttl;
        self.inner.stats.acquired.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Record created");
        Ok(true)
    }

    /// Reset the expiry of `key` if it is still held with `value`.
    pub(crate) async fn touch(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.round_trip().await?;
        let now = Instant::now();
        let touched = match self.inner.records.get_mut(key) {
            Some(mut record) if !record.is_expired(now) && record.value == value => {
                record.expires_at = now + ttl;
                true
            }
            _ => false,
        };
        if touched {
            self.inner.stats.extended.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner
                .stats
                .extend_rejected
                .fetch_add(1, Ordering::Relaxed);
        }
        Ok(touched)
    }

    /// Delete `key` if it is still held with `value`.
    pub(crate) async fn delete_if(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.round_trip().await?;
        let now = Instant::now();
        let removed = self
            .inner
            .records
            .remove_if(key, |_, r| !r.is_expired(now) && r.value == value)
            .is_some();
        if removed {
            self.inner.stats.released.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Record deleted");
        } else {
            self.inner
                .stats
                .release_rejected
                .fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }
}

fn purge(inner: &StoreInner) -> usize {
    let now = Instant::now();
    let mut purged = 0;
    inner.records.retain(|_, r| {
        let live = !r.is_expired(now);
        if !live {
            purged += 1;
        }
        live
    });
    purged
}

#[async_trait]
impl StoreConnection for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.round_trip().await
    }
}

impl MutexService for MemoryStore {
    fn new_mutex(&self, key: &str, options: &MutexOptions) -> Arc<dyn DistributedMutex> {
        Arc::new(MemoryMutex::new(self.clone(), key, options.resolve()))
    }
}
