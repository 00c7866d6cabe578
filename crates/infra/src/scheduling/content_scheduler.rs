//! Interval scheduler for content block synchronization.
//!
//! Every tick runs one synchronization: fetch all pages through the
//! [`ContentFetcher`], then hand the aggregate to the [`ContentUploader`].
//! Runs are spawned as their own tasks so the loop keeps ticking; a tick
//! that arrives while a run is still in progress is skipped.
//!
//! Two tokens control shutdown:
//! - the scheduler's own loop token, cancelled by [`ContentSyncScheduler::stop`],
//!   only halts future ticks;
//! - the process-wide shutdown token passed to [`ContentSyncScheduler::new`];
//!   every run works on a child of it, so cancelling it aborts an in-flight run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use contentsync_core::{ContentFetcher, ContentUploader};
//! use contentsync_infra::observability::metrics::SyncMetrics;
//! use contentsync_infra::scheduling::{ContentSyncScheduler, SchedulerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     fetcher: Arc<dyn ContentFetcher>,
//! #     uploader: Arc<dyn ContentUploader>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = CancellationToken::new();
//! let mut scheduler = ContentSyncScheduler::new(
//!     fetcher,
//!     uploader,
//!     SchedulerConfig::default(),
//!     Arc::new(SyncMetrics::new()),
//!     shutdown.clone(),
//! );
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! shutdown.cancel();
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contentsync_core::{ContentFetcher, ContentUploader, FetchReport};
use contentsync_domain::constants::{DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS};
use contentsync_domain::{ContentBlocksRequest, ContentSyncError, SchedulerSettings, SyncRunReport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::metrics::SyncMetrics;
use crate::observability::MetricsResult;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the content sync scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Fire the first run immediately instead of after one interval
    pub run_on_start: bool,
    /// Upper bound for a single run
    pub run_timeout: Duration,
    /// How long `stop` waits for the loop task to exit
    pub stop_timeout: Duration,
    /// Query sent on every run
    pub request: ContentBlocksRequest,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            run_on_start: false,
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
            stop_timeout: Duration::from_secs(5),
            request: ContentBlocksRequest::default(),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            interval: settings.interval(),
            run_on_start: settings.run_on_start,
            run_timeout: settings.run_timeout(),
            ..Self::default()
        }
    }
}

/// Clears the in-progress flag when the run ends, however it ends.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a run needs, shared between the loop and `run_once`
#[derive(Clone)]
struct RunContext {
    fetcher: Arc<dyn ContentFetcher>,
    uploader: Arc<dyn ContentUploader>,
    metrics: Arc<SyncMetrics>,
    request: ContentBlocksRequest,
    run_timeout: Duration,
    shutdown: CancellationToken,
    in_progress: Arc<AtomicBool>,
    current_run: TaskHandle,
}

impl RunContext {
    /// Start a run on its own task unless one is already in progress.
    async fn spawn_run(&self) {
        let Some(guard) = RunGuard::acquire(&self.in_progress) else {
            warn!("Previous sync run still in progress; skipping tick");
            log_metric(self.metrics.record_skipped(), "scheduler.sync.skipped");
            return;
        };

        let context = self.clone();
        let handle = tokio::spawn(async move {
            context.execute(guard).await;
        });
        *self.current_run.lock().await = Some(handle);
    }

    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    async fn execute(&self, _guard: RunGuard) -> SyncRunReport {
        let mut report = SyncRunReport::begin(self.request.clone(), Utc::now());
        tracing::Span::current().record("run_id", tracing::field::display(report.run_id));
        log_metric(self.metrics.record_run_started(), "scheduler.sync.start_run");
        info!("Sync run started");

        let cancel = self.shutdown.child_token();
        let outcome = tokio::time::timeout(self.run_timeout, self.fetch_and_upload(&cancel)).await;

        match outcome {
            Ok(Ok(fetched)) => {
                let blocks = fetched.blocks.len();
                report.complete(fetched.total_pages, blocks, fetched.failures, Utc::now());
            }
            Ok(Err(err)) => report.fail(err.to_string(), Utc::now()),
            Err(_) => {
                cancel.cancel();
                let err = ContentSyncError::Timeout(self.run_timeout);
                error!(error = %err, "syncing content blocks failed");
                report.fail(err.to_string(), Utc::now());
            }
        }

        log_metric(self.metrics.record_report(&report), "scheduler.sync.report");
        info!(
            outcome = %report.outcome,
            total_pages = report.total_pages,
            blocks = report.blocks,
            failed_pages = report.page_failures.len(),
            metrics = ?self.metrics.snapshot(),
            "Sync run finished"
        );
        report
    }

    async fn fetch_and_upload(
        &self,
        cancel: &CancellationToken,
    ) -> Result<FetchReport, ContentSyncError> {
        let fetched =
            self.fetcher.fetch_report(self.request.clone(), cancel).await.map_err(|err| {
                error!(error = %err, kind = err.kind(), "failed to fetch content blocks");
                err
            })?;

        self.uploader.upload_content_blocks(&fetched.blocks, cancel).await.map_err(|err| {
            error!(error = %err, kind = err.kind(), "failed to upload content blocks");
            err
        })?;

        Ok(fetched)
    }
}

/// Interval scheduler for content block synchronization
pub struct ContentSyncScheduler {
    context: RunContext,
    config: SchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl ContentSyncScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Produces the aggregate for a run
    /// * `uploader` - Receives the aggregate
    /// * `config` - Scheduler configuration
    /// * `metrics` - Run counters
    /// * `shutdown` - Process-wide token; runs are cancelled through it
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        uploader: Arc<dyn ContentUploader>,
        config: SchedulerConfig,
        metrics: Arc<SyncMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        let context = RunContext {
            fetcher,
            uploader,
            metrics,
            request: config.request.clone(),
            run_timeout: config.run_timeout,
            shutdown,
            in_progress: Arc::new(AtomicBool::new(false)),
            current_run: Arc::new(Mutex::new(None)),
        };

        Self {
            context,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that ticks every `interval`.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            run_on_start = self.config.run_on_start,
            "Starting content sync scheduler"
        );

        // Create a new cancellation token (supports restart after stop)
        self.cancellation_token = CancellationToken::new();

        let context = self.context.clone();
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::run_loop(context, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Content sync scheduler started");
        Ok(())
    }

    /// Stop scheduling new runs
    ///
    /// A run that is already in progress keeps going; cancel the shutdown
    /// token to abort it, or await [`Self::wait_for_idle`].
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping content sync scheduler");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.stop_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: join_timeout })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("Content sync scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle that
    /// hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Whether a run is executing right now
    pub fn is_run_in_progress(&self) -> bool {
        self.context.in_progress.load(Ordering::Acquire)
    }

    /// Execute one run immediately on the caller's task.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::RunInProgress`] if a run is already
    /// executing. Failures inside the run are reported in the returned
    /// [`SyncRunReport`], not as errors.
    pub async fn run_once(&self) -> SchedulerResult<SyncRunReport> {
        let guard =
            RunGuard::acquire(&self.context.in_progress).ok_or(SchedulerError::RunInProgress)?;
        Ok(self.context.execute(guard).await)
    }

    /// Wait for the most recently scheduled run to finish.
    pub async fn wait_for_idle(&self) -> SchedulerResult<()> {
        let handle = self.context.current_run.lock().await.take();
        if let Some(handle) = handle {
            handle.await.map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }
        Ok(())
    }

    /// Counters updated by every run.
    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.context.metrics
    }

    /// Background tick loop
    async fn run_loop(context: RunContext, config: SchedulerConfig, cancel: CancellationToken) {
        let period = config.interval.max(Duration::from_millis(1));
        let first_tick =
            if config.run_on_start { Instant::now() } else { Instant::now() + period };
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Content sync loop cancelled");
                    break;
                }
                _ = ticker.tick() => context.spawn_run().await,
            }
        }
    }
}

fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        warn!(metric = metric, error = ?err, "Failed to record scheduler metric");
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for ContentSyncScheduler {
    fn drop(&mut self) {
        if self.is_running() && !self.cancellation_token.is_cancelled() {
            warn!("ContentSyncScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
