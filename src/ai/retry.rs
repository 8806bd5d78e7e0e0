//! Retry Policy and Backoff Engine
//!
//! Deterministic exponential backoff:
//! `delay(attempt) = min(base · multiplier^attempt, max_delay)` for 0-based
//! attempt indices. Retries are bounded per model; exhausting one model moves
//! the fallback to the next with the attempt counter reset to zero.
//!
//! The model × attempt progression is an explicit state machine
//! ([`FallbackState`]) so the abort-everything rule for terminal errors stays
//! structurally obvious and testable in isolation.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::constants::retry as retry_constants;

/// Immutable per-invoker retry policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum retries per model (attempts = retries + 1)
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_millis(retry_constants::MAX_DELAY_MS),
            multiplier: retry_constants::BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }

    /// Backoff delay before retrying after the given 0-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        // Large exponents overflow f64 or exceed Duration's range; the result
        // is capped at max_delay either way, so bail out before converting.
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Total attempts made on each model before falling back.
    pub fn attempts_per_model(&self) -> u32 {
        self.max_retries + 1
    }

    /// Merge a partial override over this policy, field by field.
    pub fn merge(&self, patch: RetryPolicyOverride) -> Self {
        Self {
            max_retries: patch.max_retries.unwrap_or(self.max_retries),
            base_delay: patch.base_delay.unwrap_or(self.base_delay),
            max_delay: patch.max_delay.unwrap_or(self.max_delay),
            multiplier: patch.multiplier.unwrap_or(self.multiplier),
        }
    }
}

/// Partial retry-policy override; unset fields keep their current values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicyOverride {
    pub max_retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub multiplier: Option<f64>,
}

// =============================================================================
// Fallback State Machine
// =============================================================================

/// Position in the model × attempt grid for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FallbackState {
    pub model_idx: usize,
    pub attempt: u32,
}

/// Transition taken after a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    /// Retry the same model after sleeping the given backoff delay.
    Retry(Duration),
    /// Move to the first attempt of the next model.
    NextModel,
    /// Every model has used all of its attempts.
    Exhausted,
}

impl FallbackState {
    pub fn start() -> Self {
        Self {
            model_idx: 0,
            attempt: 0,
        }
    }

    /// Advance past a recoverable failure. Terminal failures never reach
    /// this; the orchestrator returns before consulting the state machine.
    pub fn on_failure(&mut self, policy: &RetryPolicy, model_count: usize) -> Advance {
        if self.attempt < policy.max_retries {
            let delay = policy.delay_for(self.attempt);
            self.attempt += 1;
            Advance::Retry(delay)
        } else if self.model_idx + 1 < model_count {
            self.model_idx += 1;
            self.attempt = 0;
            Advance::NextModel
        } else {
            Advance::Exhausted
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(max_retries: u32, base_ms: u64, max_ms: u64, multiplier: f64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier,
        }
    }

    #[test]
    fn test_delay_follows_exponential_law() {
        let p = policy(5, 1_000, 10_000, 2.0);
        assert_eq!(p.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(p.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(p.delay_for(3), Duration::from_millis(8_000));
        // Capped at max_delay from here on
        assert_eq!(p.delay_for(4), Duration::from_millis(10_000));
        assert_eq!(p.delay_for(10), Duration::from_millis(10_000));
    }

    #[test]
    fn test_delay_survives_huge_attempt_indices() {
        let p = policy(5, 1_000, 10_000, 2.0);
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_delay_caps_finite_but_out_of_range_exponents() {
        // 2^65 seconds is finite in f64 but beyond Duration's range
        let p = policy(70, 1_000, 10_000, 2.0);
        assert_eq!(p.delay_for(65), Duration::from_millis(10_000));
        assert_eq!(p.delay_for(64), Duration::from_millis(10_000));
    }

    #[test]
    fn test_merge_partial_override() {
        let base = RetryPolicy::default();
        let merged = base.merge(RetryPolicyOverride {
            max_retries: Some(5),
            max_delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        assert_eq!(merged.max_retries, 5);
        assert_eq!(merged.max_delay, Duration::from_secs(60));
        assert_eq!(merged.base_delay, base.base_delay);
        assert_eq!(merged.multiplier, base.multiplier);
    }

    #[test]
    fn test_fallback_grid_walk() {
        // 2 models, max_retries = 2: expect 3 attempts per model, 6 total.
        let p = policy(2, 1, 10, 2.0);
        let mut state = FallbackState::start();
        let mut attempts = 1; // the attempt that just failed

        loop {
            match state.on_failure(&p, 2) {
                Advance::Retry(_) | Advance::NextModel => attempts += 1,
                Advance::Exhausted => break,
            }
        }

        assert_eq!(attempts, 6);
        assert_eq!(state.model_idx, 1);
        assert_eq!(state.attempt, 2);
    }

    #[test]
    fn test_fallback_resets_attempt_counter_per_model() {
        let p = policy(1, 1, 10, 2.0);
        let mut state = FallbackState::start();

        assert!(matches!(state.on_failure(&p, 2), Advance::Retry(_)));
        assert_eq!(state.attempt, 1);
        assert_eq!(state.on_failure(&p, 2), Advance::NextModel);
        assert_eq!(state.model_idx, 1);
        assert_eq!(state.attempt, 0);
    }

    #[test]
    fn test_single_model_exhausts_without_fallback() {
        let p = policy(0, 1, 10, 2.0);
        let mut state = FallbackState::start();
        assert_eq!(state.on_failure(&p, 1), Advance::Exhausted);
    }

    proptest! {
        #[test]
        fn prop_delay_monotonically_non_decreasing(
            base_ms in 1u64..5_000,
            max_ms in 5_000u64..120_000,
            multiplier in 1.0f64..4.0,
            attempt in 0u32..30,
        ) {
            let p = policy(3, base_ms, max_ms, multiplier);
            prop_assert!(p.delay_for(attempt) <= p.delay_for(attempt + 1));
            prop_assert!(p.delay_for(attempt) <= p.max_delay);
        }
    }
}
