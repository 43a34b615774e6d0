//! Worker pool that drains the target queue.
//!
//! Each worker owns one page session and its [`SessionState`]. Targets are
//! pulled from a shared queue, retried with back-off while the error is
//! retriable, and recorded in the [`FailureLog`] once attempts run out. A
//! failure that poisons the browser session closes the page; the next
//! attempt opens a fresh one and binds the location again.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use shelfscan_core::Target;
use shelfscan_scraper::{
    backoff_delay, ListingOutcome, ListingPage, ListingSession, ListingStatus, PageOpener,
    ScraperError, SessionState,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{FailedTarget, FailureLog};

#[derive(Debug, Clone)]
pub(crate) struct RunnerSettings {
    pub workers: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Budget for one attempt at one target, navigation through sink.
    pub session_timeout: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct WorkerTotals {
    extracted: usize,
    empty: usize,
    no_results: usize,
    failed: usize,
    records: usize,
}

impl WorkerTotals {
    fn record(&mut self, outcome: &ListingOutcome) {
        match outcome.status {
            ListingStatus::Extracted => self.extracted += 1,
            ListingStatus::Empty => self.empty += 1,
            ListingStatus::NoResults => self.no_results += 1,
        }
        self.records += outcome.records_emitted;
    }

    fn merge(mut self, other: Self) -> Self {
        self.extracted += other.extracted;
        self.empty += other.empty;
        self.no_results += other.no_results;
        self.failed += other.failed;
        self.records += other.records;
        self
    }
}

/// Summary of one `run` invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: usize,
    pub extracted: usize,
    pub empty: usize,
    pub no_results: usize,
    pub failed: usize,
    pub records_emitted: usize,
    pub failures: Vec<FailedTarget>,
}

impl RunReport {
    pub(crate) fn all_failed(&self) -> bool {
        self.targets > 0 && self.failed == self.targets
    }
}

/// Process every target and return the run summary. Individual failures
/// never abort the run.
pub(crate) async fn run_targets(
    opener: &dyn PageOpener,
    session: &ListingSession,
    targets: Vec<Target>,
    settings: &RunnerSettings,
    failures: &FailureLog,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let target_count = targets.len();
    let workers = settings.workers.clamp(1, target_count.max(1));
    let queue = Mutex::new(VecDeque::from(targets));

    tracing::info!(%run_id, targets = target_count, workers, "run started");

    let totals = stream::iter(0..workers)
        .map(|worker| run_worker(worker, opener, session, &queue, settings, failures))
        .buffer_unordered(workers)
        .fold(WorkerTotals::default(), |acc, t| async move { acc.merge(t) })
        .await;

    let report = RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        targets: target_count,
        extracted: totals.extracted,
        empty: totals.empty,
        no_results: totals.no_results,
        failed: totals.failed,
        records_emitted: totals.records,
        failures: failures.snapshot().await,
    };

    tracing::info!(
        %run_id,
        records = report.records_emitted,
        extracted = report.extracted,
        empty = report.empty + report.no_results,
        failed = report.failed,
        "run finished"
    );
    report
}

async fn run_worker(
    worker: usize,
    opener: &dyn PageOpener,
    session: &ListingSession,
    queue: &Mutex<VecDeque<Target>>,
    settings: &RunnerSettings,
    failures: &FailureLog,
) -> WorkerTotals {
    let mut page: Option<Box<dyn ListingPage>> = None;
    let mut state = SessionState::default();
    let mut totals = WorkerTotals::default();

    loop {
        let Some(target) = queue.lock().await.pop_front() else {
            break;
        };

        match process_with_retry(opener, session, &target, settings, &mut page, &mut state).await {
            Ok(outcome) => totals.record(&outcome),
            Err((error, attempts)) => {
                tracing::error!(
                    worker,
                    url = %target.url,
                    attempts,
                    error = %error,
                    "target failed"
                );
                totals.failed += 1;
                failures
                    .push(FailedTarget {
                        url: target.url.clone(),
                        search_term: target.search_term.clone(),
                        error: error.to_string(),
                        attempts,
                        failed_at: Utc::now(),
                    })
                    .await;
            }
        }
    }

    if let Some(page) = page.take() {
        close_page(page.as_ref()).await;
    }
    tracing::debug!(worker, ?totals, "worker finished");
    totals
}

async fn process_with_retry(
    opener: &dyn PageOpener,
    session: &ListingSession,
    target: &Target,
    settings: &RunnerSettings,
    page: &mut Option<Box<dyn ListingPage>>,
    state: &mut SessionState,
) -> Result<ListingOutcome, (ScraperError, u32)> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match attempt_target(opener, session, target, settings, page, state).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => {
                if e.requires_new_session() {
                    if let Some(stale) = page.take() {
                        close_page(stale.as_ref()).await;
                    }
                    *state = SessionState::default();
                }
                if !e.is_retriable() || attempt > settings.max_retries {
                    return Err((e, attempt));
                }
                let delay = backoff_delay(attempt, settings.backoff_base_ms);
                tracing::warn!(
                    url = %target.url,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "target attempt failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn attempt_target(
    opener: &dyn PageOpener,
    session: &ListingSession,
    target: &Target,
    settings: &RunnerSettings,
    page: &mut Option<Box<dyn ListingPage>>,
    state: &mut SessionState,
) -> Result<ListingOutcome, ScraperError> {
    if page.is_none() {
        *page = Some(opener.open().await?);
        *state = SessionState::default();
    }
    let Some(current) = page.as_deref() else {
        return Err(ScraperError::SessionLost {
            reason: "no page session".to_string(),
        });
    };

    tokio::time::timeout(
        settings.session_timeout,
        session.process_target(current, target, state),
    )
    .await
    .map_err(|_| ScraperError::SessionTimeout {
        url: target.url.clone(),
        secs: settings.session_timeout.as_secs(),
    })?
}

async fn close_page(page: &dyn ListingPage) {
    if let Err(e) = page.close().await {
        tracing::debug!(error = %e, "closing page failed");
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
