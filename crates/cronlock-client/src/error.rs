//! Lock client error types
//!
//! Schedulers treat `Acquisition` as "another node owns this run" and
//! everything else as blocking.

use cronlock_api::{MutexError, StoreError};

/// Error type for lock client operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The backing store did not answer the liveness check.
    #[error("failed to connect to backing store: {0}")]
    Connection(#[source] StoreError),

    /// The lock could not be obtained within the configured retries or deadline.
    #[error("failed to obtain lock '{key}': {source}")]
    Acquisition {
        key: String,
        #[source]
        source: MutexError,
    },

    /// The unlock call failed, or this holder no longer held the lock.
    /// Mutual exclusion may not have been honored for the whole critical section.
    #[error("failed to release lock '{key}': {source}")]
    Release {
        key: String,
        #[source]
        source: MutexError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl LockError {
    pub fn is_connection(&self) -> bool {
        matches!(self, LockError::Connection(_))
    }

    pub fn is_acquisition(&self) -> bool {
        matches!(self, LockError::Acquisition { .. })
    }

    pub fn is_release(&self) -> bool {
        matches!(self, LockError::Release { .. })
    }
}

pub type LockResult<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LockError::Connection(StoreError::Unavailable("refused".to_string()));
        assert_eq!(
            err.to_string(),
            "failed to connect to backing store: store unavailable: refused"
        );

        let err = LockError::Acquisition {
            key: "job".to_string(),
            source: MutexError::Taken("job".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to obtain lock 'job': lock 'job' already taken"
        );

        let err = LockError::Release {
            key: "job".to_string(),
            source: MutexError::NotHeld("job".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to release lock 'job': lock 'job' not held by this value"
        );
    }

    #[test]
    fn test_predicates() {
        let err = LockError::Acquisition {
            key: "job".to_string(),
            source: MutexError::Timeout,
        };
        assert!(err.is_acquisition());
        assert!(!err.is_release());
        assert!(!err.is_connection());

        let err = LockError::Connection(StoreError::Timeout);
        assert!(err.is_connection());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err = LockError::Release {
            key: "job".to_string(),
            source: MutexError::Store(StoreError::Timeout),
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("store error: store operation timed out")
        );
    }
}
