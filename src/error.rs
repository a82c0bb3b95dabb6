//! Error types for the job queue.

use std::collections::TryReserveError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything the scheduler can report to a caller.
///
/// Internal consistency violations are deliberately absent: they indicate a
/// corrupted store and panic instead of being returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store already holds `capacity` pending entries.
    #[error("scheduler is at capacity ({capacity} pending entries)")]
    CapacityExceeded { capacity: usize },

    /// Caller misuse: negative or non-finite durations, zero capacity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backing storage could not be reserved at construction.
    #[error("failed to allocate scheduler storage: {0}")]
    Allocation(String),

    /// The logical clock would exceed its representable range.
    #[error("logical clock overflow")]
    ClockOverflow,

    /// A handle was used after its scheduler was dropped.
    #[error("scheduler has been shut down")]
    SchedulerGone,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}
