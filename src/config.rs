use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SHEET_URL: &str =
    "https://docs.google.com/spreadsheets/d/1y08Sk67utKyfcMqIb65ffDlArFMZkuAFy99Ym4kYYvw/export?format=csv";
pub const DEFAULT_STORAGE_KEY: &str = "rollcallAttendance";

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub sheet_url: String,
    pub fallback_csv: PathBuf,
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub refresh_interval: Duration,
    pub gate: GateConfig,
}

/// Scan gate tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub cooldown: Duration,
    pub max_failed_attempts: u32,
    pub lockout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(1500),
            max_failed_attempts: 5,
            lockout: Duration::from_secs(30),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            sheet_url: DEFAULT_SHEET_URL.to_string(),
            fallback_csv: PathBuf::from("static/sample-data.csv"),
            data_dir: PathBuf::from("data"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            refresh_interval: Duration::from_secs(300),
            gate: GateConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys keep their
    /// defaults; unparseable numbers are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("ROLLCALL_BIND") {
            cfg.bind_addr = v;
        }
        if let Some(v) = lookup("ROLLCALL_SHEET_URL") {
            cfg.sheet_url = v;
        }
        if let Some(v) = lookup("ROLLCALL_FALLBACK_CSV") {
            cfg.fallback_csv = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_DATA_DIR") {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_STORAGE_KEY") {
            cfg.storage_key = v;
        }
        if let Some(secs) = parse_u64(&lookup, "ROLLCALL_REFRESH_SECS") {
            cfg.refresh_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = parse_u64(&lookup, "ROLLCALL_COOLDOWN_MS") {
            cfg.gate.cooldown = Duration::from_millis(ms);
        }
        if let Some(n) = parse_u64(&lookup, "ROLLCALL_MAX_FAILED_ATTEMPTS") {
            cfg.gate.max_failed_attempts = u32::try_from(n).unwrap_or(u32::MAX).max(1);
        }
        if let Some(secs) = parse_u64(&lookup, "ROLLCALL_LOCKOUT_SECS") {
            cfg.gate.lockout = Duration::from_secs(secs);
        }

        cfg
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.storage_key))
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Ignoring {key}={raw:?}: {e}");
            None
        }
    }
}
