use std::collections::HashSet;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::context::Target;
use crate::site::SiteProfile;
use crate::ConfigError;

/// Upper bound on concurrent page sessions. Each one is a full browser tab.
pub const MAX_CONCURRENCY: usize = 4;

const DEFAULT_SCROLL_ITERATIONS: u32 = 50;

/// Options for a single run, read from a YAML or JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    #[serde(default)]
    pub target_urls: Vec<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default, alias = "pincode")]
    pub requested_location: Option<String>,
    #[serde(default = "default_max_records")]
    pub max_records_per_target: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub capture_debug_artifacts: bool,
    #[serde(default)]
    pub scroll_target_count: Option<usize>,
    #[serde(default)]
    pub scroll_iteration_count: Option<u32>,
    /// Replaces the built-in profile wholesale; omitted tables keep their
    /// built-in values.
    #[serde(default)]
    pub site_profile: Option<SiteProfile>,
}

fn default_max_records() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_concurrency() -> usize {
    1
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_headless() -> bool {
    true
}

impl Default for RunInput {
    fn default() -> Self {
        Self {
            target_urls: Vec::new(),
            search_terms: Vec::new(),
            requested_location: None,
            max_records_per_target: default_max_records(),
            max_retries: default_max_retries(),
            max_concurrency: default_max_concurrency(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            headless: default_headless(),
            capture_debug_artifacts: false,
            scroll_target_count: None,
            scroll_iteration_count: None,
            site_profile: None,
        }
    }
}

impl RunInput {
    /// How many product containers the scroll loop tries to materialize.
    #[must_use]
    pub fn scroll_target_count(&self) -> usize {
        self.scroll_target_count
            .unwrap_or(self.max_records_per_target)
    }

    #[must_use]
    pub fn scroll_iteration_count(&self) -> u32 {
        self.scroll_iteration_count
            .unwrap_or(DEFAULT_SCROLL_ITERATIONS)
    }

    /// The requested location with surrounding whitespace removed, or `None`
    /// when blank.
    #[must_use]
    pub fn requested_location(&self) -> Option<&str> {
        self.requested_location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The site profile to run with: the input's override, else the built-in.
    #[must_use]
    pub fn site_profile(&self) -> SiteProfile {
        self.site_profile.clone().unwrap_or_default()
    }
}

/// Load and validate a run input file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_run_input(path: &Path) -> Result<RunInput, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InputFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let input: RunInput = serde_yaml::from_str(&content)?;
    validate_run_input(&input)?;
    Ok(input)
}

/// Check limits and target lists.
///
/// # Errors
///
/// Returns `ConfigError::NoTargets` when neither URLs nor search terms are
/// given, and `ConfigError::Validation` for out-of-range limits or malformed
/// URLs.
pub fn validate_run_input(input: &RunInput) -> Result<(), ConfigError> {
    let has_url = input.target_urls.iter().any(|u| !u.trim().is_empty());
    let has_term = input.search_terms.iter().any(|t| !t.trim().is_empty());
    if !has_url && !has_term {
        return Err(ConfigError::NoTargets);
    }

    if !(1..=MAX_CONCURRENCY).contains(&input.max_concurrency) {
        return Err(ConfigError::Validation(format!(
            "maxConcurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
            input.max_concurrency
        )));
    }

    if input.max_records_per_target == 0 {
        return Err(ConfigError::Validation(
            "maxRecordsPerTarget must be positive".to_string(),
        ));
    }

    if input.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigationTimeoutMs must be positive".to_string(),
        ));
    }

    if input.scroll_iteration_count == Some(0) {
        return Err(ConfigError::Validation(
            "scrollIterationCount must be positive".to_string(),
        ));
    }

    for url in input.target_urls.iter().map(|u| u.trim()) {
        if url.is_empty() {
            continue;
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "target URL '{url}' must be absolute http(s)"
            )));
        }
    }

    Ok(())
}

/// Turn the input's URLs and search terms into an ordered, de-duplicated
/// target list. Direct URLs come first.
///
/// # Errors
///
/// Returns `ConfigError::Validation` when search terms are given but no
/// search endpoint is configured, and `ConfigError::NoTargets` when nothing
/// remains after blank entries are dropped.
pub fn resolve_targets(
    input: &RunInput,
    search_endpoint: Option<&str>,
    query_param: &str,
) -> Result<Vec<Target>, ConfigError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for url in input.target_urls.iter().map(|u| u.trim()) {
        if !url.is_empty() && seen.insert(url.to_string()) {
            targets.push(Target::direct(url));
        }
    }

    let terms: Vec<&str> = input
        .search_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if !terms.is_empty() {
        let endpoint = search_endpoint.ok_or_else(|| {
            ConfigError::Validation(
                "searchTerms require SHELFSCAN_SEARCH_ENDPOINT to be set".to_string(),
            )
        })?;
        for term in terms {
            let url = search_url(endpoint, query_param, term);
            if seen.insert(url.clone()) {
                targets.push(Target {
                    url,
                    search_term: Some(term.to_string()),
                });
            }
        }
    }

    if targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    Ok(targets)
}

/// `<endpoint>?<param>=<urlencoded term>`, appending with `&` when the
/// endpoint already carries a query string.
#[must_use]
pub fn search_url(endpoint: &str, query_param: &str, term: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{endpoint}{separator}{query_param}={}",
        utf8_percent_encode(term, NON_ALPHANUMERIC)
    )
}
