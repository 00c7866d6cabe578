//! Error types used throughout the application

use std::time::Duration;

use thiserror::Error;

/// Main error type for ContentSync
///
/// Variants map one-to-one onto the failure modes of a synchronization run.
/// `AccessToken` and `FirstPage` wrap the underlying cause with the context
/// operators see in the logs.
#[derive(Error, Debug, Clone)]
pub enum ContentSyncError {
    /// The authentication endpoint rejected the client credentials (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// The authentication endpoint answered with a non-success status.
    #[error("failed to fetch access token, status code: {status}")]
    TokenFetchFailed { status: u16 },

    /// Connection-level failure (DNS, refused connection, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The asset query endpoint answered with a non-success status.
    #[error("failed to fetch assets for page {page}, status code: {status}")]
    PageFetchFailed { page: u32, status: u16 },

    /// A response body could not be decoded.
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// The run-scoped cancellation token fired before the run finished.
    #[error("sync run cancelled")]
    RunCancelled,

    /// Credential acquisition failed; the run was aborted.
    #[error("failed to fetch access token: {0}")]
    AccessToken(#[source] Box<ContentSyncError>),

    /// Page 1 could not be fetched; the run was aborted.
    #[error("failed to fetch first page of assets: {0}")]
    FirstPage(#[source] Box<ContentSyncError>),

    /// More pages failed than the configured tolerance allows.
    #[error("{failed} of {total} pages failed, above the configured tolerance")]
    TooManyFailedPages {
        /// Pages that failed.
        failed: usize,
        /// Pages in the run.
        total: u32,
    },

    /// The storage sink rejected the aggregated blocks.
    #[error("failed to upload content blocks: {0}")]
    Upload(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation outlived its deadline.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl ContentSyncError {
    /// Wrap a credential failure, keeping cancellation unwrapped.
    pub fn access_token(source: Self) -> Self {
        match source {
            Self::RunCancelled => Self::RunCancelled,
            other => Self::AccessToken(Box::new(other)),
        }
    }

    /// Wrap a first-page failure, keeping cancellation unwrapped.
    pub fn first_page(source: Self) -> Self {
        match source {
            Self::RunCancelled => Self::RunCancelled,
            other => Self::FirstPage(Box::new(other)),
        }
    }

    /// Innermost error once the run-level wrappers are stripped.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::AccessToken(inner) | Self::FirstPage(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Whether this error represents a cancelled run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::RunCancelled)
    }

    /// Short, stable label for structured logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::TokenFetchFailed { .. } => "token_fetch_failed",
            Self::Transport(_) => "transport",
            Self::PageFetchFailed { .. } => "page_fetch_failed",
            Self::Decode(_) => "decode",
            Self::RunCancelled => "cancelled",
            Self::AccessToken(_) => "access_token",
            Self::FirstPage(_) => "first_page",
            Self::TooManyFailedPages { .. } => "too_many_failed_pages",
            Self::Upload(_) => "upload",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Result type alias for ContentSync operations
pub type Result<T> = std::result::Result<T, ContentSyncError>;
