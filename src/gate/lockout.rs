use chrono::{DateTime, Duration, Utc};

/// Consecutive-failure counter that locks the scanner for a fixed period.
#[derive(Debug, Clone)]
pub struct Lockout {
    max_attempts: u32,
    duration: Duration,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Open,
    /// The lock ran out on this check; counters have been reset.
    Expired,
    Locked { until: DateTime<Utc> },
}

impl Lockout {
    pub fn new(max_attempts: u32, duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            duration,
            failed_attempts: 0,
            locked_until: None,
        }
    }

    /// Check the lock at `now`. Lazily clears an expired lock.
    pub fn check(&mut self, now: DateTime<Utc>) -> LockState {
        match self.locked_until {
            Some(until) if now < until => LockState::Locked { until },
            Some(_) => {
                self.clear();
                LockState::Expired
            }
            None => LockState::Open,
        }
    }

    /// Record an invalid scan. Returns true when this failure engaged the lock.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> bool {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= self.max_attempts && self.locked_until.is_none() {
            self.locked_until = Some(now + self.duration);
            return true;
        }
        false
    }

    /// Reset the failure count (successful scan). Leaves an active lock alone.
    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
    }

    /// Drop both the counter and any active lock.
    pub fn clear(&mut self) {
        self.failed_attempts = 0;
        self.locked_until = None;
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.locked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}
