pub mod lockout;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::GateConfig;
use crate::roster::{RosterStore, normalize_reg_no};
use lockout::{LockState, Lockout};

/// Result of a scan that made it past the lock and cooldown guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Verified {
        name: String,
        reg_no: String,
        timestamp: DateTime<Utc>,
    },
    AlreadyPresent {
        name: String,
        reg_no: String,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        reg_no: String,
    },
}

impl ScanOutcome {
    pub fn message(&self) -> String {
        match self {
            ScanOutcome::Verified { .. } => "Successfully verified".to_string(),
            ScanOutcome::AlreadyPresent { .. } => "Already marked as present".to_string(),
            ScanOutcome::Rejected { reg_no } => format!("Invalid registration number: {reg_no}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    /// `locked` is set when this outcome engaged the lockout.
    Processed { outcome: ScanOutcome, locked: bool },
    /// Same raw code inside the cooldown window; nothing changed.
    Cooldown,
    /// Gate is locked; the scan was dropped.
    Locked { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTick {
    Countdown { remaining_secs: i64 },
    Unlocked,
}

#[derive(Debug, Clone)]
struct LastScan {
    code: String,
    at: DateTime<Utc>,
}

/// Decides what each decoded payload does to the roster.
#[derive(Debug, Clone)]
pub struct ScanGate {
    cooldown: Duration,
    lockout: Lockout,
    last_scan: Option<LastScan>,
}

fn to_chrono(d: std::time::Duration) -> Duration {
    Duration::from_std(d).unwrap_or_else(|_| Duration::days(365))
}

/// Whole seconds left on a countdown, rounded up.
pub fn countdown_secs(remaining: Duration) -> i64 {
    let ms = remaining.num_milliseconds().max(0);
    (ms + 999) / 1000
}

impl ScanGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            cooldown: to_chrono(config.cooldown),
            lockout: Lockout::new(config.max_failed_attempts, to_chrono(config.lockout)),
            last_scan: None,
        }
    }

    /// Run one decoded payload through the gate at time `now`.
    pub fn scan(&mut self, roster: &mut RosterStore, raw: &str, now: DateTime<Utc>) -> ScanDecision {
        match self.lockout.check(now) {
            LockState::Locked { until } => return ScanDecision::Locked { remaining: until - now },
            LockState::Expired => log::info!("Scanner lock expired"),
            LockState::Open => {}
        }

        let reg_no = normalize_reg_no(raw);

        // Cooldown compares the raw payload, before normalization.
        if let Some(last) = &self.last_scan {
            if last.code == raw && now - last.at < self.cooldown {
                log::debug!("Suppressed repeat scan of {raw:?}");
                return ScanDecision::Cooldown;
            }
        }
        self.last_scan = Some(LastScan { code: raw.to_string(), at: now });

        let found = if reg_no.is_empty() {
            None
        } else {
            roster.lookup(&reg_no).map(|r| r.name.clone())
        };

        let Some(name) = found else {
            let locked = self.lockout.record_failure(now);
            if locked {
                log::warn!(
                    "Scanner locked after {} failed attempts",
                    self.lockout.failed_attempts()
                );
            }
            return ScanDecision::Processed {
                outcome: ScanOutcome::Rejected { reg_no },
                locked,
            };
        };

        self.lockout.record_success();
        let outcome = match roster.arrived_at(&reg_no) {
            Some(timestamp) => ScanOutcome::AlreadyPresent { name, reg_no, timestamp },
            None => {
                roster.mark_present(&reg_no, now);
                ScanOutcome::Verified { name, reg_no, timestamp: now }
            }
        };
        ScanDecision::Processed { outcome, locked: false }
    }

    /// Re-evaluate the lock once per countdown tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<GateTick> {
        match self.lockout.check(now) {
            LockState::Locked { until } => Some(GateTick::Countdown {
                remaining_secs: countdown_secs(until - now),
            }),
            LockState::Expired => Some(GateTick::Unlocked),
            LockState::Open => None,
        }
    }

    /// Clear the lock and failure count early.
    pub fn unlock(&mut self) {
        self.lockout.clear();
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lockout.remaining(now).is_some()
    }

    pub fn lock_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.lockout.remaining(now)
    }

    pub fn failed_attempts(&self) -> u32 {
        self.lockout.failed_attempts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RegistrationRecord;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    fn setup() -> (ScanGate, RosterStore) {
        let mut roster = RosterStore::new();
        roster.load(vec![
            RegistrationRecord::new("A1", "Asha"),
            RegistrationRecord::new("AB-123", "Kiran"),
        ]);
        (ScanGate::new(GateConfig::default()), roster)
    }

    #[test]
    fn verified_then_already_present_keeps_timestamp() {
        let (mut gate, mut roster) = setup();
        let first = gate.scan(&mut roster, "a1", t0());
        assert!(matches!(
            first,
            ScanDecision::Processed { outcome: ScanOutcome::Verified { .. }, locked: false }
        ));

        let second = gate.scan(&mut roster, "A1", t0() + ms(5_000));
        match second {
            ScanDecision::Processed { outcome: ScanOutcome::AlreadyPresent { timestamp, name, .. }, .. } => {
                assert_eq!(timestamp, t0());
                assert_eq!(name, "Asha");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(roster.stats().present, 1);
    }

    #[test]
    fn cooldown_uses_raw_payload() {
        let (mut gate, mut roster) = setup();
        gate.scan(&mut roster, "zz", t0());
        assert_eq!(gate.scan(&mut roster, "zz", t0() + ms(1_499)), ScanDecision::Cooldown);
        assert_eq!(gate.failed_attempts(), 1);

        // A differently-cased raw payload is not the same code for the cooldown.
        let other = gate.scan(&mut roster, "ZZ", t0() + ms(1_600));
        assert!(matches!(other, ScanDecision::Processed { .. }));

        let after = gate.scan(&mut roster, "ZZ", t0() + ms(3_100));
        assert!(matches!(after, ScanDecision::Processed { .. }));
        assert_eq!(gate.failed_attempts(), 3);
    }

    #[test]
    fn fifth_rejection_locks_and_sixth_is_suppressed() {
        let (mut gate, mut roster) = setup();
        for i in 0..4 {
            let d = gate.scan(&mut roster, "Z9", t0() + ms(2_000 * i));
            assert!(matches!(d, ScanDecision::Processed { locked: false, .. }));
        }
        let fifth = gate.scan(&mut roster, "Z9", t0() + ms(8_000));
        assert!(matches!(
            fifth,
            ScanDecision::Processed { outcome: ScanOutcome::Rejected { .. }, locked: true }
        ));

        let sixth = gate.scan(&mut roster, "A1", t0() + ms(9_000));
        assert_eq!(sixth, ScanDecision::Locked { remaining: ms(29_000) });
        assert!(!roster.is_present("A1"));
    }

    #[test]
    fn lock_expiry_resumes_processing() {
        let (mut gate, mut roster) = setup();
        for i in 0..5 {
            gate.scan(&mut roster, &format!("bad{i}"), t0());
        }
        assert!(gate.is_locked(t0() + ms(29_999)));

        let d = gate.scan(&mut roster, "A1", t0() + ms(30_000));
        assert!(matches!(d, ScanDecision::Processed { outcome: ScanOutcome::Verified { .. }, .. }));
        assert_eq!(gate.failed_attempts(), 0);
    }

    #[test]
    fn success_resets_failed_attempts() {
        let (mut gate, mut roster) = setup();
        for i in 0..4 {
            gate.scan(&mut roster, &format!("bad{i}"), t0());
        }
        gate.scan(&mut roster, "A1", t0());
        assert_eq!(gate.failed_attempts(), 0);
        let d = gate.scan(&mut roster, "bad-again", t0());
        assert!(matches!(d, ScanDecision::Processed { locked: false, .. }));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let (mut gate, mut roster) = setup();
        let d = gate.scan(&mut roster, "   ", t0());
        assert_eq!(
            d,
            ScanDecision::Processed {
                outcome: ScanOutcome::Rejected { reg_no: String::new() },
                locked: false
            }
        );
    }

    #[test]
    fn normalized_match() {
        let (mut gate, mut roster) = setup();
        let d = gate.scan(&mut roster, " ab-123 ", t0());
        assert!(matches!(d, ScanDecision::Processed { outcome: ScanOutcome::Verified { .. }, .. }));
        assert!(roster.is_present("AB-123"));
    }

    #[test]
    fn tick_counts_down_then_unlocks() {
        let (mut gate, mut roster) = setup();
        assert_eq!(gate.tick(t0()), None);
        for i in 0..5 {
            gate.scan(&mut roster, &format!("bad{i}"), t0());
        }
        assert_eq!(gate.tick(t0() + ms(500)), Some(GateTick::Countdown { remaining_secs: 30 }));
        assert_eq!(gate.tick(t0() + ms(29_000)), Some(GateTick::Countdown { remaining_secs: 1 }));
        assert_eq!(gate.tick(t0() + ms(30_000)), Some(GateTick::Unlocked));
        assert_eq!(gate.failed_attempts(), 0);
        assert_eq!(gate.tick(t0() + ms(31_000)), None);
    }

    #[test]
    fn unlock_clears_early() {
        let (mut gate, mut roster) = setup();
        for i in 0..5 {
            gate.scan(&mut roster, &format!("bad{i}"), t0());
        }
        gate.unlock();
        assert!(!gate.is_locked(t0()));
        assert!(matches!(gate.scan(&mut roster, "A1", t0()), ScanDecision::Processed { .. }));
    }
}
