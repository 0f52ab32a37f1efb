use std::time::Duration;

/// Delay schedule between reconnect attempts
///
/// Attempts are unbounded; only the spacing is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    /// Same delay before every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            max: delay,
        }
    }

    /// Doubling delay starting at `base`, capped at `max`
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}
