//! Application context - dependency injection container

use std::sync::Arc;

use anyhow::Context as _;
use contentsync_core::{ContentFetcher, ContentSyncConfig, ContentSyncService, TokenCache};
use contentsync_domain::Config;
use contentsync_infra::observability::metrics::SyncMetrics;
use contentsync_infra::{
    build_uploader, AssetQueryClient, ContentSyncScheduler, HttpClient, MarketingCloudAuthClient,
    SchedulerConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Holds the wired services for the lifetime of the process.
pub struct AppContext {
    /// Loaded configuration.
    pub config: Config,
    /// Paginated fetch service shared with the scheduler.
    pub service: Arc<ContentSyncService>,
    /// Interval runner; owns the run guard and per-run timeout.
    pub scheduler: ContentSyncScheduler,
    /// Run counters, also read by the scheduler.
    pub metrics: Arc<SyncMetrics>,
    /// Cancelling this aborts any in-flight run.
    pub shutdown_token: CancellationToken,
}

impl AppContext {
    /// Build every adapter from `config`.
    ///
    /// # Errors
    /// Returns an error when an HTTP client, the auth endpoint URL or the
    /// storage sink cannot be constructed.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.fetch.http_timeout())
            .build()
            .context("failed to build HTTP client")?;

        let issuer = MarketingCloudAuthClient::new(&config.salesforce, http.clone())
            .context("invalid Salesforce auth URL")?;
        let tokens = Arc::new(TokenCache::new(Arc::new(issuer), config.cache.refresh_margin()));

        let service = Arc::new(
            ContentSyncService::new(tokens, Arc::new(AssetQueryClient::new(http)))
                .with_config(ContentSyncConfig::from(&config.fetch)),
        );

        let uploader =
            build_uploader(&config.storage).await.context("failed to build storage sink")?;

        let metrics = Arc::new(SyncMetrics::new());
        let shutdown_token = CancellationToken::new();
        let scheduler = ContentSyncScheduler::new(
            Arc::clone(&service) as Arc<dyn ContentFetcher>,
            uploader,
            SchedulerConfig::from(&config.scheduler),
            Arc::clone(&metrics),
            shutdown_token.clone(),
        );

        info!(
            backend = %config.storage.backend(),
            interval_secs = config.scheduler.interval_seconds,
            page_size = config.fetch.page_size,
            "Application context initialized"
        );

        Ok(Self { config, service, scheduler, metrics, shutdown_token })
    }

    /// Start the recurring trigger.
    ///
    /// # Errors
    /// Fails if the scheduler is already running.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.scheduler.start().await.context("failed to start scheduler")
    }

    /// Stop the trigger, cancel any in-flight run and wait for it to unwind.
    ///
    /// # Errors
    /// Fails if the scheduler loop or the last run does not exit in time.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        if self.scheduler.is_running() {
            self.scheduler.stop().await.context("failed to stop scheduler")?;
        }
        self.shutdown_token.cancel();
        self.scheduler.wait_for_idle().await.context("in-flight run did not finish")?;

        let snapshot = serde_json::to_string(&self.metrics.snapshot())?;
        info!(metrics = %snapshot, "ContentSync stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use contentsync_domain::{
        CacheSettings, FetchSettings, SalesforceConfig, SchedulerSettings, StorageConfig,
    };

    use super::*;

    fn config(auth_url: &str, directory: &str) -> Config {
        Config {
            salesforce: SalesforceConfig {
                auth_url: auth_url.into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
            },
            scheduler: SchedulerSettings::default(),
            fetch: FetchSettings::default(),
            cache: CacheSettings::default(),
            storage: StorageConfig::Local { directory: directory.into() },
        }
    }

    #[tokio::test]
    async fn builds_and_shuts_down_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx =
            AppContext::new(config("https://auth.example", dir.path().to_str().unwrap()))
                .await
                .unwrap();

        ctx.start().await.unwrap();
        assert!(ctx.scheduler.is_running());

        ctx.shutdown().await.unwrap();
        assert!(!ctx.scheduler.is_running());
        assert!(ctx.shutdown_token.is_cancelled());
    }

    #[tokio::test]
    async fn rejects_malformed_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppContext::new(config("not a url", dir.path().to_str().unwrap())).await;

        assert!(result.is_err());
    }
}
