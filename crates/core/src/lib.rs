//! # ContentSync Core
//!
//! Pure synchronization logic - no HTTP, storage or platform code.
//!
//! This crate contains:
//! - Port interfaces for the token endpoint, the page endpoint and the sink
//! - The access-token cache with single-flight refresh
//! - The paginated fetch orchestrator
//!
//! ## Architecture Principles
//! - Only depends on `contentsync-domain`
//! - All external I/O via traits in [`sync::ports`]
//! - Time is injected through [`time::Clock`] so expiry logic is testable

pub mod sync;
pub mod time;

pub use sync::ports::{ContentFetcher, ContentUploader, CredentialIssuer, FetchReport, PageSource};
pub use sync::service::{ContentSyncConfig, ContentSyncService};
pub use sync::token_cache::TokenCache;
pub use time::{Clock, MockClock, SystemClock};
