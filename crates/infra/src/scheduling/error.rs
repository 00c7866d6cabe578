//! Scheduler error types

use std::time::Duration;

use contentsync_domain::ContentSyncError;
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// A sync run is already in progress
    #[error("Sync run already in progress")]
    RunInProgress,

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The limit that was exceeded.
        duration: Duration,
    },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for ContentSyncError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Timeout { duration } => ContentSyncError::Timeout(duration),
            other => ContentSyncError::Config(other.to_string()),
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
