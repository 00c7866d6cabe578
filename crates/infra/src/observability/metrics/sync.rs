//! Run-level counters for content synchronization
//!
//! ## Design
//! - **SeqCst ordering** for counters used in derived rates
//! - **No locking needed** - simple atomic counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use contentsync_domain::{SyncOutcome, SyncRunReport};
use serde::Serialize;

use crate::observability::{MetricsError, MetricsResult};

/// Counters for scheduled and manual sync runs
#[derive(Debug, Default)]
pub struct SyncMetrics {
    runs_started: AtomicUsize,
    runs_succeeded: AtomicUsize,
    runs_partial: AtomicUsize,
    runs_failed: AtomicUsize,
    runs_skipped: AtomicUsize,
    pages_failed: AtomicUsize,
    blocks_uploaded: AtomicUsize,
    /// Milliseconds; 0 until the first run finishes.
    last_run_millis: AtomicU64,
}

/// Point-in-time copy of [`SyncMetrics`], for structured logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncMetricsSnapshot {
    /// Runs that got past the run guard.
    pub runs_started: usize,
    /// Runs that fetched and uploaded every page.
    pub runs_succeeded: usize,
    /// Runs that uploaded with some pages skipped.
    pub runs_partial: usize,
    /// Runs that uploaded nothing.
    pub runs_failed: usize,
    /// Ticks dropped because a run was in flight.
    pub runs_skipped: usize,
    /// Skipped pages summed over all runs.
    pub pages_failed: usize,
    /// Blocks handed to the sink by successful and partial runs.
    pub blocks_uploaded: usize,
    /// Duration of the last finished run; 0 before the first.
    pub last_run_millis: u64,
}

impl SyncMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run that acquired the run guard.
    pub fn record_run_started(&self) -> MetricsResult<()> {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Record a tick that was dropped because a run was still in progress.
    pub fn record_skipped(&self) -> MetricsResult<()> {
        self.runs_skipped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Record the outcome of a finished run.
    pub fn record_report(&self, report: &SyncRunReport) -> MetricsResult<()> {
        let finished_at =
            report.finished_at.ok_or(MetricsError::UnfinishedRun { run_id: report.run_id })?;

        match report.outcome {
            SyncOutcome::Success => self.runs_succeeded.fetch_add(1, Ordering::SeqCst),
            SyncOutcome::Partial => self.runs_partial.fetch_add(1, Ordering::SeqCst),
            SyncOutcome::Failed => self.runs_failed.fetch_add(1, Ordering::SeqCst),
        };
        self.pages_failed.fetch_add(report.page_failures.len(), Ordering::SeqCst);
        if report.outcome != SyncOutcome::Failed {
            self.blocks_uploaded.fetch_add(report.blocks, Ordering::SeqCst);
        }

        let elapsed = (finished_at - report.started_at).to_std().unwrap_or_default();
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX).max(1);
        self.last_run_millis.store(millis, Ordering::SeqCst);
        Ok(())
    }

    /// Duration of the most recently finished run.
    pub fn last_run_duration(&self) -> MetricsResult<Duration> {
        match self.last_run_millis.load(Ordering::SeqCst) {
            0 => Err(MetricsError::EmptyData { metric: "last_run_duration" }),
            millis => Ok(Duration::from_millis(millis)),
        }
    }

    /// Share of finished runs that uploaded something (0.0 to 100.0).
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let succeeded = self.runs_succeeded.load(Ordering::SeqCst);
        let partial = self.runs_partial.load(Ordering::SeqCst);
        let failed = self.runs_failed.load(Ordering::SeqCst);

        let total = succeeded + partial + failed;
        if total == 0 {
            return 0.0;
        }

        ((succeeded + partial) as f64 / total as f64) * 100.0
    }

    /// Copy every counter. Counters are read one by one, so a snapshot
    /// taken during a run may straddle an update.
    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::SeqCst),
            runs_succeeded: self.runs_succeeded.load(Ordering::SeqCst),
            runs_partial: self.runs_partial.load(Ordering::SeqCst),
            runs_failed: self.runs_failed.load(Ordering::SeqCst),
            runs_skipped: self.runs_skipped.load(Ordering::SeqCst),
            pages_failed: self.pages_failed.load(Ordering::SeqCst),
            blocks_uploaded: self.blocks_uploaded.load(Ordering::SeqCst),
            last_run_millis: self.last_run_millis.load(Ordering::SeqCst),
        }
    }
}
