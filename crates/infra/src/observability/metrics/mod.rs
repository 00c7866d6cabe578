//! Thread-safe metrics for the sync pipeline.

pub mod sync;

pub use sync::{SyncMetrics, SyncMetricsSnapshot};
