//! # ContentSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP clients for the Marketing Cloud token and asset query endpoints
//! - Storage sinks (local filesystem, S3 behind the `s3` feature)
//! - The interval scheduler that drives synchronization runs
//! - Configuration loading and run metrics
//!
//! ## Architecture
//! - Implements traits defined in `contentsync-core`
//! - Contains all "impure" code (network, filesystem, timers)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod salesforce;
pub mod scheduling;
pub mod storage;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use salesforce::{AssetQueryClient, MarketingCloudAuthClient};
pub use scheduling::{ContentSyncScheduler, SchedulerConfig, SchedulerError, SchedulerResult};
pub use storage::{build_uploader, LocalUploader};
