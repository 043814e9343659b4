use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::roster::{AttendanceMap, Stats};

/// Blob written after every attendance change so a restart within the same
/// event restores check-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub attendance: AttendanceMap,
    pub stats: Stats,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    session_id: String,
}

/// Random 8-byte hex id for this process.
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    hex::encode(bytes)
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            session_id: generate_session_id(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Read the persisted blob. A missing file is `Ok(None)`; a corrupt one is
    /// logged and treated the same.
    pub fn load(&self) -> Result<Option<SessionSnapshot>, AppError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<SessionSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                log::error!("Failed to load saved attendance data from {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    /// Write the current attendance. Empty mappings are not written.
    pub fn save(&self, attendance: &AttendanceMap, stats: Stats) -> Result<(), AppError> {
        if attendance.is_empty() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let snapshot = SessionSnapshot {
            attendance: attendance.clone(),
            stats,
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
        };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AppError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
