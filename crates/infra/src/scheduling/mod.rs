//! Scheduling infrastructure for recurring synchronization runs
//!
//! The scheduler follows the runtime rules used across this crate:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on every run
//! - Structured tracing with `SyncMetrics` integration

pub mod content_scheduler;
pub mod error;

pub use content_scheduler::{ContentSyncScheduler, SchedulerConfig};
pub use error::{SchedulerError, SchedulerResult};
