//! Jitter strategies applied on top of [`super::RetryConfig`]'s computed delay.
//!
//! Adapted from the teacher crate's transport-retry backoff, generalized from
//! a fixed exponential-multiplier model to the additive backoff/jitter
//! formula this engine's [`super::RetryConfig`] specifies.

/// Jitter strategy to prevent thundering herd on shared rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    None,
    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,
    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
    /// Decorrelated jitter: random in `[0, calculated_delay]`, independent of
    /// prior attempts (a simplified variant; true decorrelated jitter needs
    /// the previous delay, which the caller tracks across attempts).
    Decorrelated,
}

impl JitterStrategy {
    pub fn apply(self, delay_secs: f64) -> f64 {
        match self {
            JitterStrategy::None => delay_secs,
            JitterStrategy::Full => fastrand::f64() * delay_secs,
            JitterStrategy::Equal => delay_secs / 2.0 + fastrand::f64() * (delay_secs / 2.0),
            JitterStrategy::Decorrelated => fastrand::f64() * delay_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        assert_eq!(JitterStrategy::None.apply(5.0), 5.0);
    }

    #[test]
    fn full_jitter_stays_in_range() {
        for _ in 0..200 {
            let d = JitterStrategy::Full.apply(10.0);
            assert!((0.0..=10.0).contains(&d), "out of range: {d}");
        }
    }

    #[test]
    fn equal_jitter_stays_above_half() {
        for _ in 0..200 {
            let d = JitterStrategy::Equal.apply(10.0);
            assert!((5.0..=10.0).contains(&d), "out of range: {d}");
        }
    }
}
