//! Binding a delivery location before the first extraction.
//!
//! Catalog and prices depend on the delivery address, so the first target a
//! page session processes walks the storefront's location picker:
//!
//! ```text
//! Idle -> LocatorOpened -> ModalVisible -> InputFilled -> SuggestionSelected -> Confirmed
//!   \________________________\_______________\______________\___________________-> Failed
//! ```
//!
//! Every state probes an ordered list of candidate selectors and advances on
//! the first visible one. Nothing here returns an error: a missing element
//! within the step timeout moves the machine to `Failed`.

use std::fmt;
use std::time::Duration;

use shelfscan_core::LocationSelectors;

use crate::page::{first_visible, wait_for_any, ListingPage};

const POLL: Duration = Duration::from_millis(200);
const CONFIRM_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationState {
    Idle,
    LocatorOpened,
    ModalVisible,
    InputFilled,
    SuggestionSelected,
    Confirmed,
    Failed,
}

impl LocationState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, LocationState::Confirmed | LocationState::Failed)
    }
}

impl fmt::Display for LocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationState::Idle => "idle",
            LocationState::LocatorOpened => "locator_opened",
            LocationState::ModalVisible => "modal_visible",
            LocationState::InputFilled => "input_filled",
            LocationState::SuggestionSelected => "suggestion_selected",
            LocationState::Confirmed => "confirmed",
            LocationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one location setup attempt. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSessionResult {
    pub attempted: bool,
    pub succeeded: bool,
    pub resolved_location_label: Option<String>,
    pub final_state: LocationState,
}

impl LocationSessionResult {
    /// No location was requested, or it is already bound.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            attempted: false,
            succeeded: false,
            resolved_location_label: None,
            final_state: LocationState::Idle,
        }
    }
}

struct LocationFlow<'a> {
    page: &'a dyn ListingPage,
    selectors: &'a LocationSelectors,
    location: &'a str,
    step_timeout: Duration,
    input: Option<String>,
}

impl LocationFlow<'_> {
    async fn step(&mut self, state: LocationState) -> LocationState {
        match state {
            LocationState::Idle => self.open_locator().await,
            LocationState::LocatorOpened => self.await_modal().await,
            LocationState::ModalVisible => self.fill_input().await,
            LocationState::InputFilled => self.select_suggestion().await,
            LocationState::SuggestionSelected => self.confirm().await,
            terminal => terminal,
        }
    }

    async fn open_locator(&mut self) -> LocationState {
        // Some storefronts open the picker on first visit.
        if let Some(input) = first_visible(self.page, &self.selectors.input).await {
            self.input = Some(input);
            return LocationState::ModalVisible;
        }

        let Some(button) =
            wait_for_any(self.page, &self.selectors.open_button, self.step_timeout, POLL).await
        else {
            tracing::warn!("location bar not found");
            return LocationState::Failed;
        };
        match self.page.click(&button).await {
            Ok(()) => LocationState::LocatorOpened,
            Err(e) => {
                tracing::warn!(selector = %button, error = %e, "could not open location picker");
                LocationState::Failed
            }
        }
    }

    async fn await_modal(&mut self) -> LocationState {
        match wait_for_any(self.page, &self.selectors.input, self.step_timeout, POLL).await {
            Some(input) => {
                self.input = Some(input);
                LocationState::ModalVisible
            }
            None => {
                tracing::warn!("location input did not appear");
                LocationState::Failed
            }
        }
    }

    async fn fill_input(&mut self) -> LocationState {
        let Some(input) = self.input.as_deref() else {
            return LocationState::Failed;
        };
        match self.page.fill(input, self.location).await {
            Ok(()) => LocationState::InputFilled,
            Err(e) => {
                tracing::warn!(selector = %input, error = %e, "could not type location");
                LocationState::Failed
            }
        }
    }

    async fn select_suggestion(&mut self) -> LocationState {
        if let Some(suggestion) =
            wait_for_any(self.page, &self.selectors.suggestion, self.step_timeout, POLL).await
        {
            match self.page.click(&suggestion).await {
                Ok(()) => return LocationState::SuggestionSelected,
                Err(e) => {
                    tracing::debug!(selector = %suggestion, error = %e, "suggestion click failed");
                }
            }
        }

        // No usable suggestion: submit the typed value as-is.
        let Some(input) = self.input.as_deref() else {
            return LocationState::Failed;
        };
        match self.page.press_enter(input).await {
            Ok(()) => {
                tracing::debug!("no location suggestion; submitted typed value");
                LocationState::SuggestionSelected
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not submit location");
                LocationState::Failed
            }
        }
    }

    async fn confirm(&mut self) -> LocationState {
        let wait = self.step_timeout.min(CONFIRM_WAIT);
        if let Some(button) = wait_for_any(self.page, &self.selectors.confirm, wait, POLL).await {
            if let Err(e) = self.page.click(&button).await {
                tracing::debug!(selector = %button, error = %e, "confirm click failed");
            }
        }
        LocationState::Confirmed
    }

    async fn read_label(&self) -> Option<String> {
        for selector in &self.selectors.label {
            match self.page.text_of(selector).await {
                Ok(Some(text)) if !text.trim().is_empty() => return Some(text.trim().to_string()),
                Ok(_) => {}
                Err(e) => tracing::debug!(selector = %selector, error = %e, "label probe failed"),
            }
        }
        None
    }
}

/// Walk the location picker for `location`.
///
/// Always ends in [`LocationState::Confirmed`] or [`LocationState::Failed`],
/// within roughly the sum of the per-step timeouts.
pub async fn setup_location(
    page: &dyn ListingPage,
    selectors: &LocationSelectors,
    location: &str,
    step_timeout: Duration,
) -> LocationSessionResult {
    let mut flow = LocationFlow {
        page,
        selectors,
        location,
        step_timeout,
        input: None,
    };

    let mut state = LocationState::Idle;
    while !state.is_terminal() {
        let next = flow.step(state).await;
        tracing::debug!(from = %state, to = %next, "location step");
        state = next;
    }

    let succeeded = state == LocationState::Confirmed;
    let resolved_location_label = if succeeded {
        flow.read_label().await
    } else {
        None
    };

    if succeeded {
        tracing::info!(
            requested = %location,
            resolved = resolved_location_label.as_deref().unwrap_or("unknown"),
            "delivery location set"
        );
    } else {
        tracing::warn!(requested = %location, "delivery location not set; continuing with site default");
    }

    LocationSessionResult {
        attempted: true,
        succeeded,
        resolved_location_label,
        final_state: state,
    }
}
