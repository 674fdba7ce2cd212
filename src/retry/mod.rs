//! Retry configuration, policy, and outcome classification.
//!
//! [`RetryConfig`] controls timing (timeout/tries/delay/backoff/jitter,
//! §3). [`RetryPolicy`] controls which outcomes are retry candidates. The
//! actual state machine lives in [`crate::retry::engine`].

pub mod backoff;
pub mod engine;

use std::time::Duration;

use crate::error::{FortifiedError, Result};

pub use backoff::JitterStrategy;
pub use engine::Engine;

/// Default HTTP statuses the transport retries internally before surfacing.
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[500, 502, 503, 504, 429];

/// Timing configuration for one engine call.
///
/// `effective delay on attempt n = min(max_delay, delay * backoff^(n-1) +
/// (n-1) * jitter)` when `backoff > 0`, else `delay + (n-1) * jitter`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Seconds allotted per attempt.
    pub timeout: Duration,
    /// Maximum attempts. `None` means "rejected unless `max_elapsed` is set"
    /// — see [`RetryConfig::unbounded`].
    pub tries: u32,
    /// Initial inter-attempt delay.
    pub delay: Duration,
    /// Cap on inter-attempt delay. `None` means uncapped.
    pub max_delay: Option<Duration>,
    /// Multiplicative backoff factor. `0.0` means no backoff (fixed delay).
    pub backoff: f64,
    /// Additive per-attempt jitter in seconds.
    pub jitter: f64,
    /// Jitter distribution strategy applied on top of the additive jitter.
    pub jitter_strategy: JitterStrategy,
    /// Orthogonal wall-clock budget. Required when `tries` is meant to be
    /// effectively unbounded (§9 open question: the original's `tries = -1`
    /// loops forever guarded only by a counter; this rewrite instead requires
    /// an explicit ceiling here).
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            tries: 3,
            delay: Duration::from_secs(10),
            max_delay: None,
            backoff: 0.0,
            jitter: 0.0,
            jitter_strategy: JitterStrategy::None,
            max_elapsed: None,
        }
    }
}

impl RetryConfig {
    /// Build a config meant to retry effectively without bound, guarded by a
    /// wall-clock ceiling rather than an attempt counter.
    pub fn unbounded(max_elapsed: Duration) -> Self {
        Self {
            tries: u32::MAX,
            max_elapsed: Some(max_elapsed),
            ..Self::default()
        }
    }

    /// Validate the invariant from §3: an effectively-unbounded try count
    /// must carry a wall-clock budget.
    pub fn validate(&self) -> Result<()> {
        if self.tries == u32::MAX && self.max_elapsed.is_none() {
            return Err(FortifiedError::InvalidConfig(
                "tries is unbounded but no max_elapsed wall-clock budget was set".into(),
            ));
        }
        Ok(())
    }

    /// Effective delay before attempt `n` (1-indexed retry count, i.e. the
    /// delay before the *second* attempt is `delay_for_attempt(1)`).
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        let n = n as i32;
        let base = if self.backoff > 0.0 {
            self.delay.as_secs_f64() * self.backoff.powi(n - 1)
        } else {
            self.delay.as_secs_f64()
        };
        let with_jitter = base + (n - 1).max(0) as f64 * self.jitter;
        let jittered = self.jitter_strategy.apply(with_jitter);
        let capped = match self.max_delay {
            Some(max) => jittered.min(max.as_secs_f64()),
            None => jittered,
        };
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Caller predicate over a successfully-received response's status. `true` means RETRY.
pub type ResponsePredicate = Box<dyn Fn(u16) -> bool + Send + Sync>;
/// Caller predicate over a raised error. `true` means RETRY (budget permitting).
pub type ExceptionPredicate = Box<dyn Fn(&FortifiedError) -> bool + Send + Sync>;

/// Classifies which outcomes are retry candidates beyond the fixed rules in
/// §4.6's outcome table.
pub struct RetryPolicy {
    /// HTTP status codes that should be retried once observed on a
    /// successfully-received response (distinct from the transport's own
    /// internal retry-before-surfacing set).
    pub retry_statuses: Vec<u16>,
    /// Caller predicate over a successfully-received response's status and
    /// headers.
    pub should_retry_on_response: Option<ResponsePredicate>,
    /// Caller predicate over a raised error.
    pub should_retry_on_exception: Option<ExceptionPredicate>,
    /// Whether to honor a `Retry-After` response header over the computed
    /// backoff delay.
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            should_retry_on_response: None,
            should_retry_on_exception: None,
            respect_retry_after: true,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retry_statuses", &self.retry_statuses)
            .field("has_response_predicate", &self.should_retry_on_response.is_some())
            .field("has_exception_predicate", &self.should_retry_on_exception.is_some())
            .field("respect_retry_after", &self.respect_retry_after)
            .finish()
    }
}

/// Per-attempt classification outcome (§3 `AttemptOutcome`).
pub enum AttemptOutcome {
    Response(reqwest::Response),
    TransportRetryable(FortifiedError),
    LibraryRetryable(FortifiedError),
    Unexpected(FortifiedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_requires_max_elapsed() {
        let cfg = RetryConfig {
            tries: u32::MAX,
            max_elapsed: None,
            ..RetryConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RetryConfig::unbounded(Duration::from_secs(300));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn delay_formula_no_backoff_adds_jitter() {
        let cfg = RetryConfig {
            delay: Duration::from_secs(10),
            backoff: 0.0,
            jitter: 2.0,
            jitter_strategy: JitterStrategy::None,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(cfg.delay_for_attempt(2), Duration::from_secs(12));
        assert_eq!(cfg.delay_for_attempt(3), Duration::from_secs(14));
    }

    #[test]
    fn delay_formula_with_backoff() {
        let cfg = RetryConfig {
            delay: Duration::from_secs(1),
            backoff: 2.0,
            jitter: 0.0,
            jitter_strategy: JitterStrategy::None,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(cfg.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(cfg.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_capped_at_max_delay() {
        let cfg = RetryConfig {
            delay: Duration::from_secs(1),
            backoff: 2.0,
            max_delay: Some(Duration::from_secs(5)),
            jitter_strategy: JitterStrategy::None,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for_attempt(10), Duration::from_secs(5));
    }
}
