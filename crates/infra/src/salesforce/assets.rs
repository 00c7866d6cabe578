//! Asset query page fetcher

use async_trait::async_trait;
use contentsync_core::PageSource;
use contentsync_domain::constants::ASSET_QUERY_PATH;
use contentsync_domain::{ContentAssetsPage, ContentBlocksRequest, ContentSyncError, Result};
use reqwest::Method;
use tracing::{debug, instrument};

use super::endpoint;
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Fetches single pages from `{rest_instance_url}/asset/v1/content/assets/query`.
#[derive(Debug, Clone)]
pub struct AssetQueryClient {
    http: HttpClient,
}

impl AssetQueryClient {
    /// Page source over `http`.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PageSource for AssetQueryClient {
    #[instrument(skip(self, access_token, request), fields(page = request.page.page))]
    async fn fetch_page(
        &self,
        base_url: &str,
        access_token: &str,
        request: &ContentBlocksRequest,
    ) -> Result<ContentAssetsPage> {
        let url = endpoint(base_url, ASSET_QUERY_PATH)?;
        let builder =
            self.http.request(Method::POST, url).bearer_auth(access_token).json(request);
        let response = self.http.send(builder).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentSyncError::PageFetchFailed {
                page: request.page.page,
                status: status.as_u16(),
            });
        }

        let page: ContentAssetsPage =
            response.json().await.map_err(|err| ContentSyncError::from(InfraError::from(err)))?;
        debug!(count = page.count, items = page.items.len(), "Fetched asset page");
        Ok(page)
    }
}
