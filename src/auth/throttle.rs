use chrono::{DateTime, Duration, Utc};

/// Brute-force policy for logins: at most `max_attempts` failures per client
/// address inside a sliding `window`.
#[derive(Debug, Clone, Copy)]
pub struct LoginThrottle {
    pub max_attempts: i64,
    pub window: Duration,
}

impl LoginThrottle {
    pub fn new(max_attempts: i64, window_secs: i64) -> Self {
        Self {
            max_attempts,
            window: Duration::seconds(window_secs),
        }
    }

    /// Attempts recorded before this instant no longer count.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn is_locked(&self, recent_failures: i64) -> bool {
        recent_failures >= self.max_attempts
    }

    pub fn lockout_minutes(&self) -> i64 {
        self.window.num_minutes().max(1)
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(5, 15 * 60)
    }
}
