//! Error types returned across the store and mutex service boundary

/// Errors raised by a backing store connection
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised by a distributed mutex operation
#[derive(Debug, thiserror::Error)]
pub enum MutexError {
    #[error("failed to acquire lock '{0}'")]
    Failed(String),

    #[error("lock '{0}' already taken")]
    Taken(String),

    #[error("lock '{0}' not held by this value")]
    NotHeld(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("invalid lock request: {0}")]
    Invalid(String),

    #[error("value generation failed: {0}")]
    Value(#[source] anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MutexError {
    /// Whether the error means another holder currently owns the record.
    pub fn is_contention(&self) -> bool {
        matches!(self, MutexError::Failed(_) | MutexError::Taken(_))
    }
}
