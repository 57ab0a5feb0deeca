//! Shared helpers for lock client integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cronlock_client::{Locker, LockerSettings, MutexOptions};
use cronlock_memory::MemoryStore;
use tracing_subscriber::EnvFilter;

/// Route test logs through the test writer; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Options used by most tests: one attempt, service default expiry.
pub fn single_try() -> MutexOptions {
    MutexOptions::new().with_tries(1)
}

pub fn shared_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub async fn locker(store: &Arc<MemoryStore>, auto_extend: Duration) -> Locker {
    locker_with(
        store,
        LockerSettings::new()
            .with_auto_extend(auto_extend)
            .with_options(single_try()),
    )
    .await
}

pub async fn locker_with(store: &Arc<MemoryStore>, settings: LockerSettings) -> Locker {
    Locker::connect(store.clone(), settings)
        .await
        .expect("memory store is reachable")
        .into_locker()
}
