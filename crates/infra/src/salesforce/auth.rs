//! Client-credentials token exchange

use std::fmt;

use async_trait::async_trait;
use contentsync_core::CredentialIssuer;
use contentsync_domain::constants::{CLIENT_CREDENTIALS_GRANT, TOKEN_PATH};
use contentsync_domain::{AccessTokenGrant, ContentSyncError, Result, SalesforceConfig};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::endpoint;
use crate::errors::InfraError;
use crate::http::HttpClient;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

/// Issues access tokens from `{auth_url}/v2/token`.
pub struct MarketingCloudAuthClient {
    http: HttpClient,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl MarketingCloudAuthClient {
    /// Issuer for the configured client.
    ///
    /// # Errors
    /// Returns `ContentSyncError::Config` when `auth_url` is not a valid base URL.
    pub fn new(config: &SalesforceConfig, http: HttpClient) -> Result<Self> {
        Ok(Self {
            http,
            token_url: endpoint(&config.auth_url, TOKEN_PATH)?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Full token endpoint URL.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

impl fmt::Debug for MarketingCloudAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketingCloudAuthClient")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialIssuer for MarketingCloudAuthClient {
    #[instrument(skip(self), fields(url = %self.token_url))]
    async fn issue(&self) -> Result<AccessTokenGrant> {
        let body = TokenRequest {
            grant_type: CLIENT_CREDENTIALS_GRANT,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        };
        let request = self.http.request(Method::POST, self.token_url.clone()).json(&body);
        let response = self.http.send(request).await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Token endpoint rejected the client credentials");
            return Err(ContentSyncError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ContentSyncError::TokenFetchFailed { status: status.as_u16() });
        }

        let grant: AccessTokenGrant =
            response.json().await.map_err(|err| ContentSyncError::from(InfraError::from(err)))?;
        debug!(expires_in = grant.expires_in, "Access token issued");
        Ok(grant)
    }
}
