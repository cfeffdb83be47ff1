use super::RestartPolicy;
use chrono::{DateTime, Utc};
use clawd_types::{ClawdError, ClawdResult};
use parking_lot::Mutex;
use std::time::Duration;

/// In-memory crash history that decides whether another restart is allowed.
pub struct RestartTracker {
    policy: RestartPolicy,
    attempts: Mutex<Vec<DateTime<Utc>>>,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    pub fn record_attempt(&self) -> ClawdResult<Duration> {
        self.record_attempt_at(Utc::now())
    }

    /// Records a restart at `now` and returns its backoff delay, or
    /// `MaxRestartsExceeded` when the window is already full.
    pub fn record_attempt_at(&self, now: DateTime<Utc>) -> ClawdResult<Duration> {
        let mut attempts = self.attempts.lock();
        self.prune(&mut attempts, now);

        if attempts.len() as u64 >= u64::from(self.policy.max_attempts) {
            return Err(self.exceeded(&attempts, now));
        }

        attempts.push(now);
        Ok(self.policy.backoff_for(attempts.len() as u32))
    }

    pub fn should_restart(&self) -> bool {
        self.should_restart_at(Utc::now())
    }

    pub fn should_restart_at(&self, now: DateTime<Utc>) -> bool {
        let attempts = self.attempts.lock();
        (self.count_within(&attempts, now) as u64) < u64::from(self.policy.max_attempts)
    }

    pub fn attempt_count(&self) -> u32 {
        let attempts = self.attempts.lock();
        self.count_within(&attempts, Utc::now()) as u32
    }

    pub fn reset(&self) {
        self.attempts.lock().clear();
    }

    /// The error to surface when `should_restart` refuses.
    pub fn limit_error(&self) -> ClawdError {
        let attempts = self.attempts.lock();
        self.exceeded(&attempts, Utc::now())
    }

    fn exceeded(&self, attempts: &[DateTime<Utc>], now: DateTime<Utc>) -> ClawdError {
        ClawdError::MaxRestartsExceeded {
            attempts: attempts.len() as u32,
            max_attempts: self.policy.max_attempts,
            window: self.policy.window,
            last_attempt: attempts.last().copied().unwrap_or(now),
        }
    }

    fn prune(&self, attempts: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>) {
        let Some(cutoff) = self.cutoff(now) else {
            return;
        };
        attempts.retain(|t| *t > cutoff);
    }

    fn count_within(&self, attempts: &[DateTime<Utc>], now: DateTime<Utc>) -> usize {
        match self.cutoff(now) {
            Some(cutoff) => attempts.iter().filter(|t| **t > cutoff).count(),
            None => attempts.len(),
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let window = chrono::Duration::from_std(self.policy.window).ok()?;
        now.checked_sub_signed(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn tracker() -> RestartTracker {
        RestartTracker::new(RestartPolicy::default())
    }

    #[test]
    fn test_delays_grow_then_limit() {
        let tracker = tracker();
        let t0 = Utc::now();

        let delays: Vec<Duration> = (0..3)
            .map(|i| tracker.record_attempt_at(t0 + ChronoDuration::seconds(i)).unwrap())
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );

        let err = tracker
            .record_attempt_at(t0 + ChronoDuration::seconds(3))
            .unwrap_err();
        match err {
            ClawdError::MaxRestartsExceeded {
                attempts,
                max_attempts,
                window,
                last_attempt,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(max_attempts, 3);
                assert_eq!(window, Duration::from_secs(300));
                assert_eq!(last_attempt, t0 + ChronoDuration::seconds(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_refused_attempt_is_not_recorded() {
        let tracker = RestartTracker::new(RestartPolicy::default().with_max_attempts(1));
        let t0 = Utc::now();
        tracker.record_attempt_at(t0).unwrap();
        assert!(tracker.record_attempt_at(t0).is_err());
        assert!(tracker.record_attempt_at(t0).is_err());
        assert!(!tracker.should_restart_at(t0));
    }

    #[test]
    fn test_attempt_allowed_after_window_expires() {
        let tracker = tracker();
        let t0 = Utc::now();
        for i in 0..3 {
            tracker
                .record_attempt_at(t0 + ChronoDuration::seconds(i * 10))
                .unwrap();
        }
        assert!(!tracker.should_restart_at(t0 + ChronoDuration::seconds(30)));

        let later = t0 + ChronoDuration::minutes(6);
        assert!(tracker.should_restart_at(later));
        assert!(tracker.record_attempt_at(later).is_ok());
    }

    #[test]
    fn test_sparse_crashes_never_trip_limit() {
        let tracker = tracker();
        let spacing = ChronoDuration::seconds(301);
        let t0 = Utc::now();

        for i in 0..10 {
            let now = t0 + spacing * i;
            assert!(tracker.should_restart_at(now));
            assert_eq!(
                tracker.record_attempt_at(now).unwrap(),
                Duration::from_secs(1)
            );
        }
    }

    #[test]
    fn test_should_restart_does_not_mutate() {
        let tracker = tracker();
        for _ in 0..5 {
            assert!(tracker.should_restart());
        }
        assert_eq!(tracker.attempt_count(), 0);
    }

    #[test]
    fn test_reset_forgives_history() {
        let tracker = tracker();
        for _ in 0..3 {
            tracker.record_attempt().unwrap();
        }
        assert!(!tracker.should_restart());
        assert!(matches!(
            tracker.limit_error(),
            ClawdError::MaxRestartsExceeded { attempts: 3, .. }
        ));

        tracker.reset();
        assert!(tracker.should_restart());
        assert_eq!(tracker.record_attempt().unwrap(), Duration::from_secs(1));
    }
}
