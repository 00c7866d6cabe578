//! Ephemeral record of one synchronization run.
//!
//! Built by the scheduler for every tick, logged, then dropped. Never
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::ContentBlocksRequest;
use crate::impl_domain_status_conversions;

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every page was fetched and the upload succeeded.
    Success,
    /// Upload succeeded but one or more pages after the first failed.
    Partial,
    /// Token, first page, upload, timeout or cancellation failure.
    Failed,
}

impl_domain_status_conversions!(SyncOutcome {
    Success => "success",
    Partial => "partial",
    Failed => "failed",
});

/// A page that could not be fetched during an otherwise successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    /// 1-based page number.
    pub page: u32,
    /// Error message of the failed request.
    pub cause: String,
}

/// Summary of a single run, for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunReport {
    /// Correlates the log lines of one run.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Unset while the run is in flight.
    pub finished_at: Option<DateTime<Utc>>,
    /// Query the run was started with.
    pub request: ContentBlocksRequest,
    /// Final outcome; `Failed` until the run completes.
    pub outcome: SyncOutcome,
    /// Zero when the first page never arrived.
    pub total_pages: u32,
    /// Blocks handed to the sink.
    pub blocks: usize,
    /// Pages skipped in a partial run.
    pub page_failures: Vec<PageFailure>,
    /// Set when the run failed.
    pub error: Option<String>,
}

impl SyncRunReport {
    /// Open a report for a run that is about to start.
    pub fn begin(request: ContentBlocksRequest, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: None,
            request,
            outcome: SyncOutcome::Failed,
            total_pages: 0,
            blocks: 0,
            page_failures: Vec::new(),
            error: None,
        }
    }

    /// Close the report after a successful upload.
    pub fn complete(
        &mut self,
        total_pages: u32,
        blocks: usize,
        page_failures: Vec<PageFailure>,
        finished_at: DateTime<Utc>,
    ) {
        self.outcome =
            if page_failures.is_empty() { SyncOutcome::Success } else { SyncOutcome::Partial };
        self.total_pages = total_pages;
        self.blocks = blocks;
        self.page_failures = page_failures;
        self.finished_at = Some(finished_at);
    }

    /// Close the report after a run-level failure.
    pub fn fail(&mut self, error: impl Into<String>, finished_at: DateTime<Utc>) {
        self.outcome = SyncOutcome::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(finished_at);
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn outcome_round_trips_through_strings() {
        assert_eq!(SyncOutcome::Partial.to_string(), "partial");
        assert_eq!(SyncOutcome::from_str("SUCCESS").unwrap(), SyncOutcome::Success);
    }

    #[test]
    fn complete_without_failures_is_success() {
        let now = Utc::now();
        let mut report = SyncRunReport::begin(ContentBlocksRequest::default(), now);

        report.complete(2, 3, Vec::new(), now);

        assert_eq!(report.outcome, SyncOutcome::Success);
        assert_eq!(report.blocks, 3);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn complete_with_failures_is_partial() {
        let now = Utc::now();
        let mut report = SyncRunReport::begin(ContentBlocksRequest::default(), now);

        report.complete(3, 2, vec![PageFailure { page: 2, cause: "boom".into() }], now);

        assert_eq!(report.outcome, SyncOutcome::Partial);
        assert_eq!(report.page_failures.len(), 1);
    }

    #[test]
    fn fail_records_error() {
        let now = Utc::now();
        let mut report = SyncRunReport::begin(ContentBlocksRequest::default(), now);

        report.fail("failed to fetch access token: unauthorized", now);

        assert_eq!(report.outcome, SyncOutcome::Failed);
        assert_eq!(report.error.as_deref(), Some("failed to fetch access token: unauthorized"));
    }
}
