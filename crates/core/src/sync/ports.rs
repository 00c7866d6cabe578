//! Port interfaces for content synchronization
//!
//! These traits define the boundaries between the sync logic and the HTTP
//! and storage implementations in `contentsync-infra`.

use async_trait::async_trait;
use contentsync_domain::{
    AccessTokenGrant, ContentAssetsPage, ContentBlock, ContentBlocksRequest, PageFailure, Result,
};
use tokio_util::sync::CancellationToken;

/// Issues fresh access tokens from the authentication endpoint
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Exchange the configured client credentials for a new token.
    ///
    /// A 401 maps to `Unauthorized`, any other non-success status to
    /// `TokenFetchFailed`.
    async fn issue(&self) -> Result<AccessTokenGrant>;
}

/// Fetches a single page of the asset query
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Query one page from the REST instance at `base_url`.
    async fn fetch_page(
        &self,
        base_url: &str,
        access_token: &str,
        request: &ContentBlocksRequest,
    ) -> Result<ContentAssetsPage>;
}

/// Blocks gathered by one fetch, plus the pages that were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Blocks from every page that succeeded, in page order.
    pub blocks: Vec<ContentBlock>,
    /// Page count derived from the first page.
    pub total_pages: u32,
    /// Pages after the first that failed and were skipped.
    pub failures: Vec<PageFailure>,
}

impl FetchReport {
    /// True when any page was skipped.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Produces the full set of content blocks for a query
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch every page and report which ones failed.
    async fn fetch_report(
        &self,
        request: ContentBlocksRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchReport>;

    /// Fetch every page, keeping only the blocks.
    async fn fetch_content_blocks(
        &self,
        request: ContentBlocksRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentBlock>> {
        Ok(self.fetch_report(request, cancel).await?.blocks)
    }
}

/// Receives the aggregated blocks of a run
#[async_trait]
pub trait ContentUploader: Send + Sync {
    /// Persist `blocks` as one aggregate. Must return `RunCancelled` once
    /// `cancel` fires.
    async fn upload_content_blocks(
        &self,
        blocks: &[ContentBlock],
        cancel: &CancellationToken,
    ) -> Result<()>;
}
