//! Delay schedule between retries of a session call.

use std::time::Duration;

/// Grows by `factor` per failed attempt up to `ceiling`, with symmetric jitter.
///
/// The ceiling also bounds server-requested waits (`Retry-After`), so a
/// misbehaving tenant cannot park a caller for the whole deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    first: Duration,
    ceiling: Duration,
    factor: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(first: Duration, ceiling: Duration, factor: f64) -> Self {
        Self {
            first,
            ceiling,
            factor: factor.max(1.0),
            jitter: 0.1,
        }
    }

    /// Fraction of the delay randomly added or removed, clamped to `0.0..=1.0`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let growth = self.factor.powi(attempt.saturating_sub(1).min(63) as i32);
        let planned = Duration::try_from_secs_f64(self.first.as_secs_f64() * growth)
            .map_or(self.ceiling, |d| d.min(self.ceiling));

        if self.jitter == 0.0 {
            return planned;
        }
        planned.mul_f64(1.0 + self.jitter * rand::random_range(-1.0..=1.0))
    }

    /// Wait before the next attempt when the server asked for `requested`.
    ///
    /// Never shorter than the schedule, never longer than the ceiling.
    pub fn delay_with_hint(&self, attempt: u32, requested: Option<Duration>) -> Duration {
        let scheduled = self.delay_for(attempt);
        match requested {
            Some(requested) => requested.min(self.ceiling).max(scheduled),
            None => scheduled,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(5), 2.0)
    }
}
