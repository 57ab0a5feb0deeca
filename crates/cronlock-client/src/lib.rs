//! Cronlock Client - distributed lock client for job schedulers
//!
//! This crate provides:
//! - `Locker`: lock factory bound to a backing store, with strict or lenient connectivity checks
//! - `Lock`: handle to one acquired lock, released exactly once
//! - Auto-extend: a supervised renewal task per handle that keeps long jobs locked
//! - Settings loading through the `config` crate
//! - The `DistributedLocker`/`DistributedLock` contract consumed by schedulers

pub mod error;
pub mod lock;
pub mod locker;
pub mod metrics;
pub mod renewal;
pub mod scheduler;
pub mod settings;

pub use error::{LockError, LockResult};
pub use lock::{Lock, LockState, ReleaseStatus};
pub use locker::{Connected, Locker};
pub use self::metrics::init_metrics;
pub use renewal::{RenewalExit, RenewalReport};
pub use scheduler::{DistributedLock, DistributedLocker, run_exclusive};
pub use settings::{LockerConfig, LockerSettings};

// Boundary types callers need to configure a locker
pub use cronlock_api::{MutexOptions, RetryDelay};
