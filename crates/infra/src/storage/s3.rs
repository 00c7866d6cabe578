//! S3-compatible object storage sink

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use contentsync_core::{Clock, ContentUploader, SystemClock};
use contentsync_domain::{ContentBlock, ContentSyncError, Result, S3Config};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::{encode, object_key};

/// Puts the aggregate at `{prefix}/{YYYY-MM-DD}/content-block.json`.
#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    bucket: String,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl S3Uploader {
    /// Uploader over an already configured client. Leading and trailing
    /// slashes are stripped from `bucket` and `prefix`.
    pub fn new(client: Client, bucket: &str, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.trim_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build a client from the default AWS credential chain plus the
    /// optional region, endpoint and addressing overrides.
    #[instrument(level = "debug", skip(config), fields(bucket = %config.bucket))]
    pub async fn from_config(config: &S3Config) -> Result<Self> {
        if config.bucket.trim_matches('/').is_empty() {
            return Err(ContentSyncError::Config("S3 bucket must not be empty".to_string()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region.as_ref().filter(|r| !r.is_empty()) {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut s3_cfg = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = config.custom_endpoint.as_ref().filter(|e| !e.is_empty()) {
            s3_cfg = s3_cfg.endpoint_url(endpoint);
        }
        if config.use_path_style {
            s3_cfg = s3_cfg.force_path_style(true);
        }

        Ok(Self::new(Client::from_conf(s3_cfg.build()), &config.bucket, &config.path_prefix))
    }

    /// Date folders follow `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bucket name, slashes trimmed.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key for an upload made now.
    pub fn object_key(&self) -> String {
        object_key(&self.prefix, self.clock.now())
    }
}

#[async_trait]
impl ContentUploader for S3Uploader {
    #[instrument(skip_all, fields(bucket = %self.bucket, blocks = blocks.len()))]
    async fn upload_content_blocks(
        &self,
        blocks: &[ContentBlock],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ContentSyncError::RunCancelled);
        }

        let body = encode(blocks)?;
        let key = self.object_key();
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ContentSyncError::RunCancelled),
            sent = put => {
                sent.map_err(|err| {
                    ContentSyncError::Upload(format!(
                        "s3://{}/{key}: {}",
                        self.bucket,
                        DisplayErrorContext(&err)
                    ))
                })?;
            }
        }

        info!(key = %key, "Content blocks uploaded");
        Ok(())
    }
}
