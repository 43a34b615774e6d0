//! The `run` command: resolve targets, drive the browser, write records.

mod runner;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shelfscan_core::{AppConfig, RunInput};
use shelfscan_scraper::{
    BrowserOptions, FieldExtractor, ListingSession, ScrollPolicy, SessionConfig, WebDriverBrowser,
};

use crate::sink::JsonlSink;
use crate::store::{FailureLog, FsArtifactStore};

pub(crate) use runner::RunReport;
use runner::{run_targets, RunnerSettings};

/// Command-line values that take precedence over the input file.
#[derive(Debug, Default, Clone)]
pub(crate) struct RunOverrides {
    pub headed: bool,
    pub max_concurrency: Option<usize>,
    pub output: Option<PathBuf>,
}

fn apply_overrides(input: &mut RunInput, overrides: &RunOverrides) {
    if overrides.headed {
        input.headless = false;
    }
    if let Some(n) = overrides.max_concurrency {
        input.max_concurrency = n;
    }
}

fn session_config(config: &AppConfig, input: &RunInput) -> SessionConfig {
    SessionConfig {
        max_records: input.max_records_per_target,
        requested_location: input.requested_location().map(str::to_owned),
        load_timeout: Duration::from_millis(input.navigation_timeout_ms),
        results_timeout: Duration::from_millis(config.results_timeout_ms),
        location_step_timeout: Duration::from_millis(config.location_step_timeout_ms),
        scroll: ScrollPolicy::new(input.scroll_target_count(), input.scroll_iteration_count()),
        capture_debug_artifacts: input.capture_debug_artifacts,
    }
}

/// Run every target in `input_path` and return the report.
///
/// # Errors
///
/// Returns an error if the input is invalid, resolves to no targets, the
/// output or storage location cannot be opened, or every target failed.
pub(crate) async fn run_listing(
    config: &AppConfig,
    input_path: &Path,
    overrides: &RunOverrides,
) -> anyhow::Result<RunReport> {
    let mut input = shelfscan_core::load_run_input(input_path)?;
    apply_overrides(&mut input, overrides);
    shelfscan_core::validate_run_input(&input)?;

    let targets = shelfscan_core::resolve_targets(
        &input,
        config.search_endpoint.as_deref(),
        &config.search_query_param,
    )?;

    let output = overrides
        .output
        .clone()
        .unwrap_or_else(|| config.output_path.clone());
    let sink = Arc::new(JsonlSink::create(&output).await?);
    let store = Arc::new(FsArtifactStore::create(&config.store_dir).await?);
    let failures = FailureLog::new(Some(Arc::clone(&store)));

    let browser = WebDriverBrowser::new(BrowserOptions {
        webdriver_url: config.webdriver_url.clone(),
        headless: input.headless,
        user_agent: config.user_agent.clone(),
        command_timeout: Duration::from_millis(config.eval_timeout_ms),
        navigation_timeout: Duration::from_millis(input.navigation_timeout_ms),
    });

    let extractor = FieldExtractor::new(
        input.site_profile(),
        Duration::from_millis(config.eval_timeout_ms),
    );
    let session = ListingSession::new(
        extractor,
        session_config(config, &input),
        sink.clone(),
        Some(store),
    );

    let settings = RunnerSettings {
        workers: input.max_concurrency,
        max_retries: input.max_retries,
        backoff_base_ms: config.retry_backoff_base_ms,
        session_timeout: Duration::from_secs(config.session_timeout_secs),
    };

    tracing::info!(
        targets = targets.len(),
        output = %sink.path().display(),
        location = input.requested_location().unwrap_or("site default"),
        "starting run"
    );

    let report = run_targets(&browser, &session, targets, &settings, &failures).await;

    if report.all_failed() {
        anyhow::bail!("all {} targets failed", report.failed);
    }
    Ok(report)
}
