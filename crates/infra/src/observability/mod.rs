//! Observability infrastructure for run metrics
//!
//! Logging goes through `tracing`; this module only keeps in-process
//! counters that the scheduler updates and logs after every run.
//!
//! All record methods return `MetricsResult<()>` so callers can log and drop
//! a failed recording instead of failing the run:
//!
//! ```rust
//! use contentsync_infra::observability::metrics::SyncMetrics;
//!
//! let metrics = SyncMetrics::new();
//! if let Err(e) = metrics.record_run_started() {
//!     tracing::warn!("Failed to record metric: {}", e);
//! }
//! ```

pub mod metrics;

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set - cannot calculate aggregate metric
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData {
        /// Metric name that failed (e.g., "last_run_duration")
        metric: &'static str,
    },

    /// A report was recorded before the run finished
    #[error("Run {run_id} has no finish time")]
    UnfinishedRun {
        /// Identifier of the offending run
        run_id: uuid::Uuid,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
