//! Cronlock API - contracts shared by the lock client and its backing stores
//!
//! This crate provides:
//! - The external mutual-exclusion service contract (`MutexService`, `DistributedMutex`)
//! - The backing store liveness contract (`StoreConnection`)
//! - Acquisition options passed through to the service (`MutexOptions`)
//! - Boundary error types (`MutexError`, `StoreError`)

pub mod error;
pub mod options;
pub mod service;

pub use error::{MutexError, StoreError};
pub use options::{
    DEFAULT_DRIFT_FACTOR, DEFAULT_EXPIRY, DEFAULT_TIMEOUT_FACTOR, DEFAULT_TRIES, MutexConfig,
    MutexOptions, RetryDelay, ValueGenerator, generate_value,
};
pub use service::{DistributedMutex, MutexService, StoreConnection};
