//! Paginated content fetch - core business logic
//!
//! One run fetches page 1 sequentially to learn the total count, then fans
//! the remaining pages out to spawned tasks. Pages after the first are
//! allowed to fail: their blocks are skipped and the failure is reported.
//! Any failure before that point aborts the run.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use contentsync_domain::constants::{DEFAULT_PAGE_SIZE, FIRST_PAGE};
use contentsync_domain::{
    ContentAssetsPage, ContentBlock, ContentBlocksRequest, ContentSyncError, Credential,
    FetchSettings, PageFailure, Result,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::pagination::{remaining_pages, total_pages};
use super::ports::{ContentFetcher, FetchReport, PageSource};
use super::token_cache::TokenCache;
use crate::time::{Clock, SystemClock};

/// Fetch behaviour knobs
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSyncConfig {
    /// Used when the request carries a zero page size.
    pub default_page_size: u32,
    /// `None` requests every remaining page at once.
    pub max_concurrent_pages: Option<usize>,
    /// `None` tolerates any number of failed pages after the first.
    pub max_failed_page_ratio: Option<f64>,
}

impl Default for ContentSyncConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_pages: None,
            max_failed_page_ratio: None,
        }
    }
}

impl From<&FetchSettings> for ContentSyncConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            default_page_size: if settings.page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                settings.page_size
            },
            max_concurrent_pages: settings.max_concurrent_pages,
            max_failed_page_ratio: settings.max_failed_page_ratio,
        }
    }
}

type PageResult = Result<ContentAssetsPage>;

/// In-flight page requests, aborted when dropped.
struct PageTasks {
    handles: Vec<(u32, JoinHandle<PageResult>)>,
}

impl Drop for PageTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
    }
}

/// Content fetch service
pub struct ContentSyncService<C: Clock = SystemClock> {
    tokens: Arc<TokenCache<C>>,
    pages: Arc<dyn PageSource>,
    config: ContentSyncConfig,
}

impl<C: Clock> ContentSyncService<C> {
    /// Service with the default fetch configuration.
    pub fn new(tokens: Arc<TokenCache<C>>, pages: Arc<dyn PageSource>) -> Self {
        Self { tokens, pages, config: ContentSyncConfig::default() }
    }

    /// Replace the fetch configuration.
    pub fn with_config(mut self, config: ContentSyncConfig) -> Self {
        self.config = config;
        self
    }

    /// The cache this service draws tokens from.
    pub fn token_cache(&self) -> &Arc<TokenCache<C>> {
        &self.tokens
    }

    /// Fetch every page of `request`.
    ///
    /// Blocks are returned in page order. Failed pages after the first are
    /// listed in the report instead of failing the call, unless
    /// `max_failed_page_ratio` is exceeded.
    #[instrument(skip_all, fields(page_size = request.page.page_size))]
    pub async fn fetch_all(
        &self,
        request: ContentBlocksRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchReport> {
        if cancel.is_cancelled() {
            return Err(ContentSyncError::RunCancelled);
        }

        let credential = self
            .tokens
            .get_or_refresh(cancel)
            .await
            .map_err(ContentSyncError::access_token)?;
        let credential = Arc::new(credential);

        let page_size = match request.page.page_size {
            0 => self.config.default_page_size,
            size => size,
        };
        let request = request.for_page(FIRST_PAGE, page_size);

        let first = until_cancelled(
            cancel,
            self.pages.fetch_page(&credential.rest_instance_url, &credential.access_token, &request),
        )
        .await
        .map_err(ContentSyncError::first_page)?;

        let total_pages = total_pages(first.count, first.page_size).ok_or_else(|| {
            ContentSyncError::first_page(ContentSyncError::Decode(format!(
                "page 1 reported {} items with a page size of {}",
                first.count, first.page_size
            )))
        })?;
        debug!(
            count = first.count,
            total_pages,
            page_size = first.page_size,
            "Fetched first page"
        );

        // The server may cap the requested size; the rest of the run uses
        // whatever page 1 reported.
        let page_size = first.page_size;
        let mut blocks = first.items;
        let mut failures = Vec::new();
        if total_pages > 1 {
            let tasks = self.spawn_remaining(&request, page_size, total_pages, &credential);
            collect_pages(tasks, cancel, &mut blocks, &mut failures).await?;
        }

        self.check_failure_tolerance(failures.len(), total_pages)?;
        if failures.is_empty() {
            info!(total_pages, blocks = blocks.len(), "Fetched all content blocks");
        } else {
            warn!(
                total_pages,
                failed_pages = failures.len(),
                blocks = blocks.len(),
                "Fetched content blocks with missing pages"
            );
        }

        Ok(FetchReport { blocks, total_pages, failures })
    }

    fn spawn_remaining(
        &self,
        request: &ContentBlocksRequest,
        page_size: u32,
        total_pages: u32,
        credential: &Arc<Credential>,
    ) -> PageTasks {
        let limiter = self
            .config
            .max_concurrent_pages
            .map(|limit| Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS))));

        let handles = remaining_pages(total_pages)
            .map(|page| {
                let pages = Arc::clone(&self.pages);
                let credential = Arc::clone(credential);
                let limiter = limiter.clone();
                let page_request = request.for_page(page, page_size);

                let handle = tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };
                    pages
                        .fetch_page(
                            &credential.rest_instance_url,
                            &credential.access_token,
                            &page_request,
                        )
                        .await
                });
                (page, handle)
            })
            .collect();

        PageTasks { handles }
    }

    fn check_failure_tolerance(&self, failed: usize, total: u32) -> Result<()> {
        match self.config.max_failed_page_ratio {
            Some(max)
                if total > 0
                    && f64::from(u32::try_from(failed).unwrap_or(u32::MAX)) / f64::from(total)
                        > max =>
            {
                Err(ContentSyncError::TooManyFailedPages { failed, total })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<C: Clock> ContentFetcher for ContentSyncService<C> {
    async fn fetch_report(
        &self,
        request: ContentBlocksRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchReport> {
        self.fetch_all(request, cancel).await
    }
}

async fn collect_pages(
    mut tasks: PageTasks,
    cancel: &CancellationToken,
    blocks: &mut Vec<ContentBlock>,
    failures: &mut Vec<PageFailure>,
) -> Result<()> {
    for (page, handle) in tasks.handles.iter_mut() {
        let page = *page;
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(page, "Run cancelled while pages were in flight");
                return Err(ContentSyncError::RunCancelled);
            }
            joined = handle => joined,
        };

        let outcome = joined.unwrap_or_else(|err| {
            Err(ContentSyncError::Transport(format!("page task failed: {err}")))
        });
        match outcome {
            Ok(fetched) => blocks.extend(fetched.items),
            Err(err) => {
                error!(page, error = %err, "Error fetching page {page}: {err}");
                failures.push(PageFailure { page, cause: err.to_string() });
            }
        }
    }
    Ok(())
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ContentSyncError::RunCancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use contentsync_domain::AccessTokenGrant;
    use serde_json::json;

    use super::*;
    use crate::sync::ports::CredentialIssuer;
    use crate::time::MockClock;

    struct StubIssuer {
        calls: AtomicUsize,
        reject: bool,
    }

    #[async_trait]
    impl CredentialIssuer for StubIssuer {
        async fn issue(&self) -> Result<AccessTokenGrant> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(ContentSyncError::Unauthorized);
            }
            Ok(AccessTokenGrant {
                access_token: "token".into(),
                expires_in: 1080,
                rest_instance_url: "https://rest.example".into(),
            })
        }
    }

    /// Serves `count` blocks named `block-{i}` in pages of the requested size.
    struct ScriptedPages {
        count: u64,
        failing: HashSet<u32>,
        delay_after_first: Duration,
        max_page_size: Option<u32>,
        requests: Mutex<Vec<ContentBlocksRequest>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedPages {
        fn new(count: u64) -> Self {
            Self {
                count,
                failing: HashSet::new(),
                delay_after_first: Duration::ZERO,
                max_page_size: None,
                requests: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, pages: &[u32]) -> Self {
            self.failing = pages.iter().copied().collect();
            self
        }

        /// Answer with at most `limit` items per page, like a server-side cap.
        fn capped_at(mut self, limit: u32) -> Self {
            self.max_page_size = Some(limit);
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay_after_first = delay;
            self
        }

        fn requested_pages(&self) -> Vec<u32> {
            let mut pages: Vec<u32> =
                self.requests.lock().unwrap().iter().map(|r| r.page.page).collect();
            pages.sort_unstable();
            pages
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPages {
        async fn fetch_page(
            &self,
            base_url: &str,
            access_token: &str,
            request: &ContentBlocksRequest,
        ) -> Result<ContentAssetsPage> {
            assert_eq!(base_url, "https://rest.example");
            assert_eq!(access_token, "token");
            self.requests.lock().unwrap().push(request.clone());

            let page = request.page.page;
            let size = self
                .max_page_size
                .map_or(request.page.page_size, |limit| request.page.page_size.min(limit));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if page > 1 && !self.delay_after_first.is_zero() {
                tokio::time::sleep(self.delay_after_first).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&page) {
                return Err(ContentSyncError::PageFetchFailed { page, status: 500 });
            }
            let start = u64::from(page - 1) * u64::from(size);
            let end = (start + u64::from(size)).min(self.count);
            Ok(ContentAssetsPage {
                count: self.count,
                page,
                page_size: size,
                items: (start..end).map(|i| ContentBlock::new(format!("block-{i}"))).collect(),
            })
        }
    }

    fn service(
        pages: &Arc<ScriptedPages>,
        issuer: &Arc<StubIssuer>,
    ) -> ContentSyncService<MockClock> {
        let tokens = Arc::new(TokenCache::with_clock(
            Arc::clone(issuer) as Arc<dyn CredentialIssuer>,
            Duration::from_secs(120),
            MockClock::new(),
        ));
        ContentSyncService::new(tokens, Arc::clone(pages) as Arc<dyn PageSource>)
    }

    fn issuer() -> Arc<StubIssuer> {
        Arc::new(StubIssuer { calls: AtomicUsize::new(0), reject: false })
    }

    fn contents(blocks: &[ContentBlock]) -> Vec<&str> {
        blocks.iter().map(|b| b.content.as_str()).collect()
    }

    #[tokio::test]
    async fn empty_result_needs_only_the_first_page() {
        let pages = Arc::new(ScriptedPages::new(0));
        let service = service(&pages, &issuer());

        let report = service
            .fetch_all(ContentBlocksRequest::with_page_size(10), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.blocks.is_empty());
        assert_eq!(report.total_pages, 0);
        assert_eq!(pages.requested_pages(), vec![1]);
    }

    #[tokio::test]
    async fn collects_every_page_in_order() {
        let pages = Arc::new(ScriptedPages::new(7));
        let service = service(&pages, &issuer());

        let report = service
            .fetch_all(ContentBlocksRequest::with_page_size(3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.total_pages, 3);
        assert_eq!(pages.requested_pages(), vec![1, 2, 3]);
        assert_eq!(
            contents(&report.blocks),
            vec!["block-0", "block-1", "block-2", "block-3", "block-4", "block-5", "block-6"]
        );
        assert!(!report.is_partial());
    }

    #[tokio::test]
    async fn failed_later_page_is_skipped_and_reported() {
        let pages = Arc::new(ScriptedPages::new(7).failing(&[2]));
        let service = service(&pages, &issuer());

        let report = service
            .fetch_all(ContentBlocksRequest::with_page_size(3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(contents(&report.blocks), vec!["block-0", "block-1", "block-2", "block-6"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].page, 2);
        assert!(report.failures[0].cause.contains("status code: 500"));
    }

    #[tokio::test]
    async fn first_page_failure_aborts_the_run() {
        let pages = Arc::new(ScriptedPages::new(7).failing(&[1]));
        let service = service(&pages, &issuer());

        let err = service
            .fetch_all(ContentBlocksRequest::with_page_size(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ContentSyncError::FirstPage(_)));
        assert!(err.to_string().starts_with("failed to fetch first page of assets"));
        assert_eq!(pages.requested_pages(), vec![1]);
    }

    #[tokio::test]
    async fn token_failure_issues_no_page_requests() {
        let pages = Arc::new(ScriptedPages::new(7));
        let issuer = Arc::new(StubIssuer { calls: AtomicUsize::new(0), reject: true });
        let service = service(&pages, &issuer);

        let err = service
            .fetch_all(ContentBlocksRequest::with_page_size(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "failed to fetch access token: unauthorized");
        assert!(pages.requested_pages().is_empty());
    }

    #[tokio::test]
    async fn cached_token_is_reused_across_runs() {
        let pages = Arc::new(ScriptedPages::new(2));
        let issuer = issuer();
        let service = service(&pages, &issuer);
        let cancel = CancellationToken::new();

        service.fetch_all(ContentBlocksRequest::with_page_size(5), &cancel).await.unwrap();
        service.fetch_all(ContentBlocksRequest::with_page_size(5), &cancel).await.unwrap();

        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_page_size_falls_back_to_default_and_keeps_payload() {
        let pages = Arc::new(ScriptedPages::new(3));
        let service = service(&pages, &issuer()).with_config(ContentSyncConfig {
            default_page_size: 2,
            ..ContentSyncConfig::default()
        });
        let request = ContentBlocksRequest {
            query: Some(json!({ "property": "assetType.name", "value": "htmlblock" })),
            ..ContentBlocksRequest::default()
        };

        let report = service.fetch_all(request.clone(), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.blocks.len(), 3);
        let sent = pages.requests.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|r| r.page.page_size == 2 && r.query == request.query));
    }

    #[tokio::test]
    async fn concurrency_limit_is_respected() {
        let pages = Arc::new(ScriptedPages::new(10).slow(Duration::from_millis(10)));
        let service = service(&pages, &issuer()).with_config(ContentSyncConfig {
            max_concurrent_pages: Some(1),
            ..ContentSyncConfig::default()
        });

        let report = service
            .fetch_all(ContentBlocksRequest::with_page_size(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.blocks.len(), 10);
        assert_eq!(pages.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn later_pages_use_the_page_size_reported_by_page_one() {
        let pages = Arc::new(ScriptedPages::new(6).capped_at(2));
        let service = service(&pages, &issuer());

        let report = service
            .fetch_all(ContentBlocksRequest::with_page_size(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.total_pages, 3);
        let mut sent: Vec<(u32, u32)> = pages
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.page.page, r.page.page_size))
            .collect();
        sent.sort_unstable();
        assert_eq!(sent, vec![(1, 10), (2, 2), (3, 2)]);
        assert_eq!(
            contents(&report.blocks),
            vec!["block-0", "block-1", "block-2", "block-3", "block-4", "block-5"]
        );
    }

    #[tokio::test]
    async fn repeated_fetches_return_identical_blocks() {
        let pages = Arc::new(ScriptedPages::new(11).failing(&[3]));
        let service = service(&pages, &issuer());
        let cancel = CancellationToken::new();

        let first =
            service.fetch_all(ContentBlocksRequest::with_page_size(3), &cancel).await.unwrap();
        let second =
            service.fetch_all(ContentBlocksRequest::with_page_size(3), &cancel).await.unwrap();

        assert_eq!(first.total_pages, 4);
        assert_eq!(first.blocks.len(), 8);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn oversized_concurrency_limit_is_clamped() {
        let pages = Arc::new(ScriptedPages::new(5));
        let service = service(&pages, &issuer()).with_config(ContentSyncConfig {
            max_concurrent_pages: Some(usize::MAX),
            ..ContentSyncConfig::default()
        });

        let report = service
            .fetch_all(ContentBlocksRequest::with_page_size(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.blocks.len(), 5);
        assert_eq!(report.total_pages, 3);
    }

    #[tokio::test]
    async fn too_many_failed_pages_fails_the_run() {
        let pages = Arc::new(ScriptedPages::new(9).failing(&[2, 3]));
        let service = service(&pages, &issuer()).with_config(ContentSyncConfig {
            max_failed_page_ratio: Some(0.5),
            ..ContentSyncConfig::default()
        });

        let err = service
            .fetch_all(ContentBlocksRequest::with_page_size(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ContentSyncError::TooManyFailedPages { failed: 2, total: 3 }));
    }

    #[tokio::test]
    async fn cancellation_stops_in_flight_pages() {
        let pages = Arc::new(ScriptedPages::new(6).slow(Duration::from_secs(30)));
        let service = service(&pages, &issuer());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            service.fetch_all(ContentBlocksRequest::with_page_size(2), &cancel),
        )
        .await
        .expect("cancellation should end the run")
        .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_run_does_nothing() {
        let pages = Arc::new(ScriptedPages::new(6));
        let issuer = issuer();
        let service = service(&pages, &issuer);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service.fetch_content_blocks(ContentBlocksRequest::default(), &cancel).await;

        assert!(matches!(err, Err(ContentSyncError::RunCancelled)));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
        assert!(pages.requested_pages().is_empty());
    }
}
