//! Configuration structures
//!
//! Loaded by `contentsync_infra::config` from the environment or a TOML/JSON
//! file. Every section except `salesforce` has defaults.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOCAL_STORAGE_DIR, DEFAULT_PAGE_SIZE,
    DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS, TOKEN_REFRESH_MARGIN_SECS,
};
use crate::impl_domain_status_conversions;

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Authentication endpoint and client credentials.
    pub salesforce: SalesforceConfig,
    /// Recurring trigger and per-run timeout.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Page size, concurrency and failure tolerance.
    #[serde(default)]
    pub fetch: FetchSettings,
    /// Token cache tuning.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Where aggregated blocks are written; local directory by default.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Client credentials for the Marketing Cloud authentication endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceConfig {
    /// Base URL of the authentication endpoint, without the token path.
    pub auth_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// Never logged; `Debug` redacts it.
    pub client_secret: String,
}

impl fmt::Debug for SalesforceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SalesforceConfig")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Recurring trigger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Seconds between run starts.
    pub interval_seconds: u64,
    /// Fire the first run immediately instead of after one interval.
    pub run_on_start: bool,
    /// A run still going after this many seconds is cancelled.
    pub run_timeout_seconds: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            run_on_start: false,
            run_timeout_seconds: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl SchedulerSettings {
    /// [`Self::interval_seconds`] as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// [`Self::run_timeout_seconds`] as a `Duration`.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

/// Page fetching behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Page size used when the request does not carry one.
    pub page_size: u32,
    /// Cap on concurrent page requests; `None` fetches every page at once.
    pub max_concurrent_pages: Option<usize>,
    /// Fail the run when the failed-page ratio exceeds this value.
    pub max_failed_page_ratio: Option<f64>,
    /// Per-request timeout for both token and page calls.
    pub http_timeout_seconds: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_pages: None,
            max_failed_page_ratio: None,
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl FetchSettings {
    /// [`Self::http_timeout_seconds`] as a `Duration`.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// Token cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Serve a cached token only while it has more than this many seconds
    /// left.
    pub refresh_margin_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { refresh_margin_seconds: TOKEN_REFRESH_MARGIN_SECS }
    }
}

impl CacheSettings {
    /// [`Self::refresh_margin_seconds`] as a `Duration`.
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_seconds)
    }
}

/// Which sink receives the aggregated blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Filesystem directory.
    Local,
    /// S3-compatible bucket.
    S3,
}

impl_domain_status_conversions!(StorageBackend {
    Local => "local",
    S3 => "s3",
});

/// Storage sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Write to the local filesystem.
    Local {
        /// Root directory; date folders are created beneath it.
        directory: String,
    },
    /// Write to a bucket.
    S3(S3Config),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local { directory: DEFAULT_LOCAL_STORAGE_DIR.to_string() }
    }
}

impl StorageConfig {
    /// Backend selected by this configuration.
    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Local { .. } => StorageBackend::Local,
            Self::S3(_) => StorageBackend::S3,
        }
    }
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Target bucket name.
    pub bucket: String,
    /// Key prefix; the date folder goes beneath it.
    #[serde(default)]
    pub path_prefix: String,
    /// Falls back to the SDK region chain when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override for S3-compatible stores.
    #[serde(default)]
    pub custom_endpoint: Option<String>,
    /// Address buckets as `{endpoint}/{bucket}` rather than by subdomain.
    #[serde(default)]
    pub use_path_style: bool,
}
