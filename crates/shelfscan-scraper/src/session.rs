//! Per-target orchestration: navigate, bind location, wait for results,
//! scroll, extract, annotate, and hand off to the sink.

use std::sync::Arc;
use std::time::Duration;

use shelfscan_core::{LandingContext, ProductRecord, Target};

use crate::error::ScraperError;
use crate::extract::FieldExtractor;
use crate::location::{setup_location, LocationSessionResult};
use crate::page::{first_visible, wait_for_any, ListingPage};
use crate::scroll::{load_more, ScrollExit, ScrollPolicy};
use crate::sink::{ArtifactStore, RecordSink};

const RESULTS_POLL: Duration = Duration::from_millis(250);

/// What one page session carries from target to target.
///
/// Reset whenever the worker opens a fresh page, which also drops the bound
/// location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Targets whose navigation succeeded on this page. A target that failed
    /// before reaching the page does not count, so its retry still binds the
    /// location.
    pub targets_opened: usize,
    pub location_bound: bool,
    pub location_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_records: usize,
    pub requested_location: Option<String>,
    /// Bound on the document-ready wait after navigation.
    pub load_timeout: Duration,
    /// How long to wait for the first product container.
    pub results_timeout: Duration,
    pub location_step_timeout: Duration,
    pub scroll: ScrollPolicy,
    pub capture_debug_artifacts: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_records: 100,
            requested_location: None,
            load_timeout: Duration::from_secs(60),
            results_timeout: Duration::from_secs(10),
            location_step_timeout: Duration::from_secs(8),
            scroll: ScrollPolicy::default(),
            capture_debug_artifacts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    /// Records were extracted and accepted by the sink.
    Extracted,
    /// No product container appeared within the results timeout.
    NoResults,
    /// Containers appeared but no tier produced a record.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOutcome {
    pub status: ListingStatus,
    pub records_emitted: usize,
    /// Highest container count the scroll loop observed.
    pub final_count: usize,
    pub scroll_exit: Option<ScrollExit>,
    pub location: LocationSessionResult,
}

/// Runs one target at a time on a caller-owned page. Shared by all workers.
pub struct ListingSession {
    extractor: FieldExtractor,
    config: SessionConfig,
    sink: Arc<dyn RecordSink>,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl ListingSession {
    #[must_use]
    pub fn new(
        extractor: FieldExtractor,
        config: SessionConfig,
        sink: Arc<dyn RecordSink>,
        store: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        Self {
            extractor,
            config,
            sink,
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process `target` on `page`.
    ///
    /// Absence of results is an `Ok` outcome with zero records. Only
    /// navigation, browser, and sink failures are errors.
    ///
    /// # Errors
    ///
    /// Returns `ScraperError` if navigation fails, the browser session is
    /// lost, or the sink rejects the batch.
    pub async fn process_target(
        &self,
        page: &dyn ListingPage,
        target: &Target,
        state: &mut SessionState,
    ) -> Result<ListingOutcome, ScraperError> {
        tracing::info!(url = %target.url, search_term = ?target.search_term, "processing target");
        self.open(page, &target.url).await?;

        let ctx = LandingContext::for_target(
            target,
            self.config.requested_location.as_deref(),
            state.targets_opened == 0,
        );
        state.targets_opened += 1;

        let location = match ctx.requested_location.as_deref() {
            Some(requested) if ctx.is_first_request_in_run && !state.location_bound => {
                let result = setup_location(
                    page,
                    &self.extractor.profile().location,
                    requested,
                    self.config.location_step_timeout,
                )
                .await;
                state.location_bound = result.succeeded;
                state.location_label.clone_from(&result.resolved_location_label);
                if result.succeeded {
                    // Picking a location re-renders the catalog; start from a clean listing.
                    self.open(page, &target.url).await?;
                }
                result
            }
            _ => LocationSessionResult::skipped(),
        };

        let containers = &self.extractor.profile().container_selectors;
        if wait_for_any(page, containers, self.config.results_timeout, RESULTS_POLL)
            .await
            .is_none()
        {
            tracing::warn!(url = %target.url, "no listing appeared; zero records for target");
            self.capture_debug(page, target, "no-results").await;
            return Ok(ListingOutcome {
                status: ListingStatus::NoResults,
                records_emitted: 0,
                final_count: 0,
                scroll_exit: None,
                location,
            });
        }

        let scroll = load_more(page, self.extractor.profile(), &self.config.scroll).await;

        let base_url = match page.current_url().await {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(error = %e, "current url unavailable; using target url");
                target.url.clone()
            }
        };
        let mut records = self.extractor.extract(page, &base_url).await;
        records.truncate(self.config.max_records);
        self.annotate(&mut records, &ctx, state, &target.url);

        if records.is_empty() {
            tracing::warn!(
                url = %target.url,
                containers = scroll.final_count,
                "listing rendered but nothing was extracted"
            );
            self.capture_debug(page, target, "empty").await;
            return Ok(ListingOutcome {
                status: ListingStatus::Empty,
                records_emitted: 0,
                final_count: scroll.final_count,
                scroll_exit: Some(scroll.exit),
                location,
            });
        }

        self.sink.append(&records).await?;
        tracing::info!(
            url = %target.url,
            records = records.len(),
            containers = scroll.final_count,
            strategy = %records[0].extraction_strategy,
            "target extracted"
        );

        Ok(ListingOutcome {
            status: ListingStatus::Extracted,
            records_emitted: records.len(),
            final_count: scroll.final_count,
            scroll_exit: Some(scroll.exit),
            location,
        })
    }

    async fn open(&self, page: &dyn ListingPage, url: &str) -> Result<(), ScraperError> {
        page.goto(url).await?;
        if let Err(e) = page.wait_for_load(self.config.load_timeout).await {
            tracing::debug!(url = %url, error = %e, "load signal not seen; continuing");
        }
        self.dismiss_overlay(page).await;
        Ok(())
    }

    async fn dismiss_overlay(&self, page: &dyn ListingPage) {
        let candidates = &self.extractor.profile().overlay_close_selectors;
        if let Some(selector) = first_visible(page, candidates).await {
            match page.click(&selector).await {
                Ok(()) => tracing::debug!(selector = %selector, "dismissed overlay"),
                Err(e) => tracing::debug!(selector = %selector, error = %e, "overlay close failed"),
            }
        }
    }

    fn annotate(
        &self,
        records: &mut [ProductRecord],
        ctx: &LandingContext,
        state: &SessionState,
        source_url: &str,
    ) {
        let platform = &self.extractor.profile().platform;
        for record in records {
            record.search_term.clone_from(&ctx.search_term);
            record.requested_location.clone_from(&ctx.requested_location);
            record.resolved_location.clone_from(&state.location_label);
            record.platform = Some(platform.clone());
            record.source_url = Some(source_url.to_string());
        }
    }

    /// Screenshot and HTML of the current page, when enabled. Failures are
    /// logged and swallowed.
    async fn capture_debug(&self, page: &dyn ListingPage, target: &Target, reason: &str) {
        if !self.config.capture_debug_artifacts {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        let slug = target.slug();

        match page.screenshot().await {
            Ok(png) => {
                if let Err(e) = store.put(&format!("{slug}-{reason}.png"), png, "image/png").await {
                    tracing::warn!(url = %target.url, error = %e, "could not store screenshot");
                }
            }
            Err(e) => tracing::debug!(url = %target.url, error = %e, "screenshot failed"),
        }

        match page.content().await {
            Ok(html) => {
                let key = format!("{slug}-{reason}.html");
                if let Err(e) = store.put(&key, html.into_bytes(), "text/html").await {
                    tracing::warn!(url = %target.url, error = %e, "could not store html snapshot");
                }
            }
            Err(e) => tracing::debug!(url = %target.url, error = %e, "page source failed"),
        }
    }
}
