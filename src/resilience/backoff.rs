//! Deterministic backoff schedules.

use std::time::Duration;

/// Exponential schedule: `initial, initial*m, initial*m^2, ...` with no jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    next: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, multiplier: f64) -> Self {
        Self {
            next: initial,
            multiplier,
        }
    }

    /// Return the current delay and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        self.next = scale(current, self.multiplier);
        current
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Linear schedule used by error report submission: `base * attempt`.
pub fn linear_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

fn scale(delay: Duration, multiplier: f64) -> Duration {
    let scaled = delay.as_secs_f64() * multiplier;
    if !scaled.is_finite() || scaled < 0.0 {
        return Duration::MAX;
    }
    Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX)
}
