#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use contentsync_core::{ContentSyncService, TokenCache};
use contentsync_domain::SalesforceConfig;
use contentsync_infra::{AssetQueryClient, HttpClient, MarketingCloudAuthClient};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "access-token";

/// Marketing Cloud stand-in serving both the token and the asset endpoints.
pub struct MarketingCloud {
    pub server: MockServer,
}

impl MarketingCloud {
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Token endpoint issuing a grant that points back at this server.
    pub async fn mount_token(&self, expires_in: i64, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TOKEN,
                "expires_in": expires_in,
                "rest_instance_url": self.uri(),
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Asset page `page` answering with `body`.
    pub async fn mount_page(&self, page: u32, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/asset/v1/content/assets/query"))
            .and(body_partial_json(json!({ "page": { "page": page } })))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Wire the production clients against this server.
    pub fn service(&self) -> ContentSyncService {
        let config = SalesforceConfig {
            auth_url: self.uri(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        };
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("http client should build");
        let issuer = MarketingCloudAuthClient::new(&config, http.clone())
            .expect("auth client should build");
        let tokens = Arc::new(TokenCache::new(Arc::new(issuer), Duration::from_secs(120)));

        ContentSyncService::new(tokens, Arc::new(AssetQueryClient::new(http)))
    }
}

/// Page payload with `items` rendered as `Block N` contents.
pub fn page_body(count: u64, page: u32, page_size: u32, blocks: &[u32]) -> Value {
    let items: Vec<Value> =
        blocks.iter().map(|n| json!({ "content": format!("Block {n}") })).collect();
    json!({ "count": count, "page": page, "pageSize": page_size, "items": items })
}
