//! Cronlock Memory - in-process backing store
//!
//! This crate provides:
//! - `MemoryStore`: a TTL key-value store implementing `StoreConnection` and `MutexService`
//! - `MemoryMutex`: a single-node mutex with expiry, retries, drift and per-operation timeouts
//! - Fault injection (outages, latency) and operation counters for tests

mod mutex;
mod store;

pub use mutex::MemoryMutex;
pub use store::{MemoryStore, StoreStats};
