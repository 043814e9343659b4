//! Shared test infrastructure for the integration tests.
//!
//! - `test_config()` - temp data dir plus a fallback roster file, sheet URL unreachable
//! - `fixed_clock()` - a clock the test can move by hand

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use rollcall::config::AppConfig;
use rollcall::engine::{Clock, EngineHandle, StatusView};
use rollcall::roster::RegistrationRecord;

// ============================================================================
// TEST CONSTANTS
// ============================================================================

/// Loopback discard port: connections are refused straight away.
pub const DEAD_SHEET_URL: &str = "http://127.0.0.1:9/export?format=csv";

pub const ROSTER_CSV: &str = "\
Timestamp,Name,Reg. No.,Email,ATTENDANCE
2026-03-01 08:00,Asha,a1,asha@example.com,FALSE
2026-03-01 08:05,Ravi, B2 ,ravi@example.com,
";

// ============================================================================
// SETUP
// ============================================================================

/// Config pointing at a temp data dir, with `roster_csv` as the bundled
/// fallback and an unreachable sheet. Keep the TempDir alive for the test.
pub fn test_config(roster_csv: &str) -> (TempDir, AppConfig) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let fallback = dir.path().join("sample-data.csv");
    std::fs::write(&fallback, roster_csv).expect("Failed to write fallback roster");

    let config = AppConfig {
        sheet_url: DEAD_SHEET_URL.to_string(),
        fallback_csv: fallback,
        data_dir: dir.path().join("data"),
        ..AppConfig::default()
    };
    std::fs::create_dir_all(&config.data_dir).expect("Failed to create data dir");
    (dir, config)
}

pub fn storage_exists(config: &AppConfig) -> bool {
    config.storage_path().exists()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// A clock stuck at `t0()` until the test moves it.
pub fn fixed_clock() -> (Arc<Mutex<DateTime<Utc>>>, Clock) {
    let now = Arc::new(Mutex::new(t0()));
    let handle = now.clone();
    (now, Arc::new(move || *handle.lock().unwrap()))
}

pub fn two_registrants() -> Vec<RegistrationRecord> {
    vec![RegistrationRecord::new("A1", "Asha"), RegistrationRecord::new("B2", "Ravi")]
}

/// Poll the engine until `pred` holds. Decode events arrive asynchronously.
pub async fn wait_for(engine: &EngineHandle, pred: impl Fn(&StatusView) -> bool) -> StatusView {
    for _ in 0..100 {
        let status = engine.status().await.expect("engine status");
        if pred(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("engine never reached the expected state");
}
