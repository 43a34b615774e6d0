//! Request-scoped values shared read-only across one target's processing.

use serde::{Deserialize, Serialize};

/// One listing page to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub url: String,
    /// Set when the URL was built from a search term rather than given
    /// directly.
    pub search_term: Option<String>,
}

impl Target {
    #[must_use]
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            search_term: None,
        }
    }

    /// A short filesystem-safe label for debug artifact keys.
    #[must_use]
    pub fn slug(&self) -> String {
        let source = self.search_term.as_deref().unwrap_or(&self.url);
        let slug = source
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        slug.chars().take(60).collect()
    }
}

/// Per-request values derived by the orchestrator before a target runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingContext {
    pub search_term: Option<String>,
    pub requested_location: Option<String>,
    /// `true` only for the first target a page session processes. Location
    /// setup is gated on it.
    pub is_first_request_in_run: bool,
}

impl LandingContext {
    #[must_use]
    pub fn for_target(
        target: &Target,
        requested_location: Option<&str>,
        is_first_request_in_run: bool,
    ) -> Self {
        Self {
            search_term: target.search_term.clone(),
            requested_location: requested_location
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            is_first_request_in_run,
        }
    }
}
