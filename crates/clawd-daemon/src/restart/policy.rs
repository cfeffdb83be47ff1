use std::time::Duration;

/// Crash-loop budget and backoff curve.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    pub max_attempts: u32,
    pub window: Duration,
    pub backoff_base: Duration,
    pub backoff_multiplier: f64,
    pub backoff_max: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            window: Duration::from_secs(5 * 60),
            backoff_base: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl RestartPolicy {
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_backoff(mut self, base: Duration, multiplier: f64, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_multiplier = multiplier;
        self.backoff_max = max;
        self
    }

    /// Delay before the `attempt`-th restart in the window (1-based), computed
    /// from scratch and capped at `backoff_max`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let secs = self.backoff_base.as_secs_f64() * factor;

        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay.min(self.backoff_max),
            Err(_) => self.backoff_max,
        }
    }
}
