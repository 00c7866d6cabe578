//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Remote API paths
/// Appended to the configured auth URL.
pub const TOKEN_PATH: &str = "/v2/token";
/// Appended to the `rest_instance_url` returned with each token.
pub const ASSET_QUERY_PATH: &str = "/asset/v1/content/assets/query";
/// OAuth grant type sent with every token request.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

// Token cache
/// Default margin: credentials count as expired this long before the
/// server-reported expiry.
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 120;

// Pagination
/// Pages are numbered from one.
pub const FIRST_PAGE: u32 = 1;
/// Page size when neither request nor config sets one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

// Scheduling
/// Daily.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;
/// Half an hour.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 30 * 60;

// HTTP transport
/// Per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

// Storage
/// File name of the aggregate inside each date folder.
pub const CONTENT_BLOCK_OBJECT_NAME: &str = "content-block.json";
/// Root of the local sink when no directory is configured.
pub const DEFAULT_LOCAL_STORAGE_DIR: &str = "./data";
/// `chrono` format of the date folder.
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";
