//! Back-off schedule for re-attempting a failed target.
//!
//! | Retry | Sleep before it                  |
//! |-------|----------------------------------|
//! | 1     | base × 2⁰ ± 25 % jitter          |
//! | 2     | base × 2¹ ± 25 % jitter          |
//! | 3     | base × 2² ± 25 % jitter          |
//!
//! Capped at 60 s before jitter.

use std::time::Duration;

const MAX_DELAY_MS: u64 = 60_000;

/// Delay before retry number `retry` (1-based).
#[must_use]
pub fn backoff_delay(retry: u32, backoff_base_ms: u64) -> Duration {
    jittered_delay(retry, backoff_base_ms, rand::random::<f64>() * 0.5 + 0.75)
}

fn capped_delay_ms(retry: u32, backoff_base_ms: u64) -> u64 {
    let exponent = retry.saturating_sub(1).min(10);
    backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(MAX_DELAY_MS)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn jittered_delay(retry: u32, backoff_base_ms: u64, factor: f64) -> Duration {
    let capped = capped_delay_ms(retry, backoff_base_ms);
    Duration::from_millis((capped as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_retry() {
        assert_eq!(capped_delay_ms(1, 2_000), 2_000);
        assert_eq!(capped_delay_ms(2, 2_000), 4_000);
        assert_eq!(capped_delay_ms(3, 2_000), 8_000);
    }

    #[test]
    fn delay_is_capped() {
        assert_eq!(capped_delay_ms(30, 2_000), MAX_DELAY_MS);
        assert_eq!(capped_delay_ms(2, u64::MAX), MAX_DELAY_MS);
    }

    #[test]
    fn jitter_scales_the_capped_delay() {
        assert_eq!(jittered_delay(1, 1_000, 0.75), Duration::from_millis(750));
        assert_eq!(jittered_delay(1, 1_000, 1.25), Duration::from_millis(1_250));
    }

    #[test]
    fn random_delay_stays_within_jitter_band() {
        for _ in 0..100 {
            let d = backoff_delay(2, 1_000).as_millis();
            assert!((1_500..=2_500).contains(&d), "delay {d}ms outside band");
        }
    }

    #[test]
    fn zero_base_means_no_wait() {
        assert_eq!(backoff_delay(3, 0), Duration::ZERO);
    }
}
