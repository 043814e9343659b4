pub mod loader;
pub mod parse;
pub mod scheduler;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown";

/// Canonical form of a registration number: trimmed and uppercased.
/// Both the roster import and the scan gate go through this.
pub fn normalize_reg_no(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub reg_no: String,
    pub name: String,
    /// Seed flag from the sheet's ATTENDANCE column. Informational only.
    pub attended: bool,
}

impl RegistrationRecord {
    pub fn new(reg_no: &str, name: &str) -> Self {
        Self {
            reg_no: normalize_reg_no(reg_no),
            name: name.to_string(),
            attended: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub present: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkResult {
    pub inserted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub record: RegistrationRecord,
    pub present: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

pub type AttendanceMap = HashMap<String, DateTime<Utc>>;

/// The loaded roster plus live check-ins.
///
/// Roster records are replaced wholesale on every load; the attendance map
/// survives loads and is only cleared by `reset`.
#[derive(Debug, Default)]
pub struct RosterStore {
    records: Vec<RegistrationRecord>,
    index: HashMap<String, usize>,
    attendance: AttendanceMap,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster snapshot. For duplicate keys the first record wins
    /// lookups; later duplicates stay in the snapshot.
    pub fn load(&mut self, records: Vec<RegistrationRecord>) {
        let mut index = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            index.entry(record.reg_no.clone()).or_insert(pos);
        }
        self.records = records;
        self.index = index;
    }

    pub fn lookup(&self, reg_no: &str) -> Option<&RegistrationRecord> {
        self.index.get(reg_no).map(|&pos| &self.records[pos])
    }

    /// Record an arrival. Never overwrites an existing check-in.
    pub fn mark_present(&mut self, reg_no: &str, at: DateTime<Utc>) -> MarkResult {
        if self.attendance.contains_key(reg_no) {
            return MarkResult { inserted: false };
        }
        self.attendance.insert(reg_no.to_string(), at);
        MarkResult { inserted: true }
    }

    pub fn is_present(&self, reg_no: &str) -> bool {
        self.attendance.contains_key(reg_no)
    }

    pub fn arrived_at(&self, reg_no: &str) -> Option<DateTime<Utc>> {
        self.attendance.get(reg_no).copied()
    }

    /// Drop every check-in. The roster itself is untouched.
    pub fn reset(&mut self) {
        self.attendance.clear();
    }

    pub fn restore_attendance(&mut self, attendance: AttendanceMap) {
        self.attendance = attendance;
    }

    pub fn attendance(&self) -> &AttendanceMap {
        &self.attendance
    }

    pub fn stats(&self) -> Stats {
        let present = self
            .attendance
            .keys()
            .filter(|reg_no| self.index.contains_key(reg_no.as_str()))
            .count();
        Stats {
            total: self.records.len(),
            present: present.min(self.records.len()),
        }
    }

    /// Every record in load order with its attendance state.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.records
            .iter()
            .map(|record| {
                let timestamp = self.arrived_at(&record.reg_no);
                SnapshotEntry {
                    record: record.clone(),
                    present: timestamp.is_some(),
                    timestamp,
                }
            })
            .collect()
    }
}
