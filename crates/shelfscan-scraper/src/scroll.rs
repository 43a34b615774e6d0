//! Incremental loading of an infinite-scroll listing.
//!
//! The controller counts product containers with the same first-matching
//! selector rule the DOM tier extracts with, scrolls, and repeats until the
//! target is reached, the count stops growing, or the iteration cap is hit.
//! The decision logic lives in [`ScrollState::observe`] and is pure; the
//! browser side effects are in [`load_more`].

use std::time::Duration;

use shelfscan_core::SiteProfile;

use crate::page::ListingPage;

pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
pub const DEFAULT_STABLE_THRESHOLD: u32 = 3;

const GROWTH_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPolicy {
    pub target_count: usize,
    pub max_iterations: u32,
    /// Consecutive unchanged reads that mean the listing is exhausted.
    pub stable_threshold: u32,
    /// Pause after each scroll and after each nudge.
    pub settle: Duration,
    pub step_px: i64,
    /// Size of the upward nudge that re-triggers lazy loaders.
    pub nudge_px: i64,
    /// When set, wait up to this long for the count to grow after a scroll.
    pub growth_wait: Option<Duration>,
}

impl ScrollPolicy {
    #[must_use]
    pub fn new(target_count: usize, max_iterations: u32) -> Self {
        Self {
            target_count,
            max_iterations,
            ..Self::default()
        }
    }
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            target_count: 100,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stable_threshold: DEFAULT_STABLE_THRESHOLD,
            settle: Duration::from_millis(800),
            step_px: 2400,
            nudge_px: 300,
            growth_wait: Some(Duration::from_secs(3)),
        }
    }
}

/// Why the controller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollExit {
    TargetReached,
    /// The count held steady for `stable_threshold` reads.
    Exhausted,
    IterationCap,
    /// A browser call failed; the loop ended early with what it had.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPhase {
    Probing,
    Growing,
    Stabilizing,
    Done(ScrollExit),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollState {
    /// Highest count seen so far. Never decreases.
    pub observed_count: usize,
    pub previous_count: usize,
    pub stable_iterations: u32,
    pub attempts: u32,
}

impl ScrollState {
    /// Record one container count and decide the next phase.
    ///
    /// A read lower than an earlier one (virtualized lists recycle nodes) is
    /// treated as no growth, not as loss.
    pub fn observe(&mut self, count: usize, policy: &ScrollPolicy) -> ScrollPhase {
        self.attempts += 1;
        self.previous_count = self.observed_count;
        self.observed_count = self.observed_count.max(count);

        if self.observed_count >= policy.target_count {
            return ScrollPhase::Done(ScrollExit::TargetReached);
        }

        let phase = if self.observed_count == self.previous_count {
            self.stable_iterations += 1;
            if self.stable_iterations >= policy.stable_threshold {
                return ScrollPhase::Done(ScrollExit::Exhausted);
            }
            ScrollPhase::Stabilizing
        } else {
            self.stable_iterations = 0;
            ScrollPhase::Growing
        };

        if self.attempts >= policy.max_iterations {
            return ScrollPhase::Done(ScrollExit::IterationCap);
        }
        phase
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub final_count: usize,
    pub exit: ScrollExit,
    pub state: ScrollState,
}

/// Scroll until the listing converges and return the highest container
/// count observed.
///
/// Never fails: a browser error ends the loop with [`ScrollExit::Error`] and
/// whatever count had been reached.
pub async fn load_more(
    page: &dyn ListingPage,
    profile: &SiteProfile,
    policy: &ScrollPolicy,
) -> ScrollOutcome {
    let selectors = &profile.container_selectors;
    let mut state = ScrollState::default();
    let mut phase = ScrollPhase::Probing;

    let exit = loop {
        let count = match page.count_first_match(selectors).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, attempts = state.attempts, "container count failed; stopping scroll");
                break ScrollExit::Error;
            }
        };

        phase = state.observe(count, policy);
        tracing::debug!(
            count,
            observed = state.observed_count,
            stable = state.stable_iterations,
            phase = ?phase,
            "scroll iteration"
        );
        if let ScrollPhase::Done(exit) = phase {
            break exit;
        }

        if let Err(e) = scroll_step(page, profile, policy).await {
            tracing::warn!(error = %e, attempts = state.attempts, "scroll failed; stopping scroll");
            break ScrollExit::Error;
        }

        if let Some(wait) = policy.growth_wait {
            wait_for_growth(page, selectors, state.observed_count, wait).await;
        }
    };

    tracing::info!(
        final_count = state.observed_count,
        attempts = state.attempts,
        exit = ?exit,
        last_phase = ?phase,
        "scroll converged"
    );

    ScrollOutcome {
        final_count: state.observed_count,
        exit,
        state,
    }
}

async fn scroll_step(
    page: &dyn ListingPage,
    profile: &SiteProfile,
    policy: &ScrollPolicy,
) -> Result<(), crate::ScraperError> {
    page.scroll_by(&profile.scroll_container_selectors, policy.step_px)
        .await?;
    tokio::time::sleep(policy.settle).await;
    page.scroll_by(&profile.scroll_container_selectors, -policy.nudge_px)
        .await?;
    tokio::time::sleep(policy.settle).await;
    Ok(())
}

/// Poll until the count exceeds `previous` or `timeout` elapses. Failure
/// here is not an error; the next iteration re-reads the count.
async fn wait_for_growth(
    page: &dyn ListingPage,
    selectors: &[String],
    previous: usize,
    timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        match page.count_first_match(selectors).await {
            Ok(count) if count > previous => return,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "growth probe failed");
                return;
            }
        }
        tokio::time::sleep(GROWTH_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(counts: &[usize], policy: &ScrollPolicy) -> (ScrollState, ScrollPhase) {
        let mut state = ScrollState::default();
        let mut phase = ScrollPhase::Probing;
        for &count in counts {
            phase = state.observe(count, policy);
            if matches!(phase, ScrollPhase::Done(_)) {
                break;
            }
        }
        (state, phase)
    }

    #[test]
    fn stabilizes_after_threshold_reads() {
        let policy = ScrollPolicy::new(100, 50);
        let (state, phase) = run(&[10, 20, 40, 40, 40, 40, 40], &policy);
        assert_eq!(phase, ScrollPhase::Done(ScrollExit::Exhausted));
        assert_eq!(state.observed_count, 40);
        assert_eq!(state.attempts, 6);
    }

    #[test]
    fn target_reached_stops_immediately() {
        let policy = ScrollPolicy::new(30, 50);
        let (state, phase) = run(&[12, 24, 36, 48], &policy);
        assert_eq!(phase, ScrollPhase::Done(ScrollExit::TargetReached));
        assert_eq!(state.observed_count, 36);
    }

    #[test]
    fn growth_resets_stability() {
        let policy = ScrollPolicy::new(100, 50);
        let mut state = ScrollState::default();
        assert_eq!(state.observe(10, &policy), ScrollPhase::Growing);
        assert_eq!(state.observe(10, &policy), ScrollPhase::Stabilizing);
        assert_eq!(state.observe(10, &policy), ScrollPhase::Stabilizing);
        assert_eq!(state.observe(11, &policy), ScrollPhase::Growing);
        assert_eq!(state.stable_iterations, 0);
    }

    #[test]
    fn shrinking_reads_never_lower_the_count() {
        let policy = ScrollPolicy::new(100, 50);
        let (state, phase) = run(&[30, 18, 18, 18], &policy);
        assert_eq!(phase, ScrollPhase::Done(ScrollExit::Exhausted));
        assert_eq!(state.observed_count, 30);
    }

    #[test]
    fn iteration_cap_bounds_endless_growth() {
        let policy = ScrollPolicy::new(10_000, 5);
        let counts: Vec<usize> = (1..=100).collect();
        let (state, phase) = run(&counts, &policy);
        assert_eq!(phase, ScrollPhase::Done(ScrollExit::IterationCap));
        assert_eq!(state.attempts, 5);
    }

    #[test]
    fn observed_count_is_monotonic_for_any_sequence() {
        let policy = ScrollPolicy::new(10_000, 50);
        let counts = [3, 9, 2, 9, 15, 1, 0, 15, 22, 7];
        let mut state = ScrollState::default();
        let mut last = 0;
        for count in counts {
            state.observe(count, &policy);
            assert!(state.observed_count >= last);
            last = state.observed_count;
        }
        assert_eq!(last, 22);
    }
}
