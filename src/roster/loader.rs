use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde::Serialize;
use tokio::sync::Mutex;

use super::parse::{self, ParsedRoster};
use crate::engine::EngineHandle;
use crate::errors::AppError;
use crate::roster::Stats;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSource {
    Primary,
    Fallback,
    Upload,
}

impl fmt::Display for RosterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterSource::Primary => write!(f, "sheet"),
            RosterSource::Fallback => write!(f, "bundled sample"),
            RosterSource::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug)]
pub enum LoadResult<T> {
    Loaded(T),
    /// Another load held the loader; nothing was fetched.
    AlreadyRunning,
}

/// Fetches the roster from the sheet export, falling back to the bundled sample.
pub struct RosterLoader {
    client: reqwest::Client,
    sheet_url: String,
    fallback_path: PathBuf,
    in_flight: Mutex<()>,
}

impl RosterLoader {
    pub fn new(sheet_url: impl Into<String>, fallback_path: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self {
            client,
            sheet_url: sheet_url.into(),
            fallback_path: fallback_path.into(),
            in_flight: Mutex::new(()),
        }
    }

    /// Sheet URL with a cache-busting `_cb` parameter.
    pub fn cache_busted_url(&self, millis: i64) -> String {
        let sep = if self.sheet_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}_cb={millis}", self.sheet_url)
    }

    pub async fn fetch_primary(&self) -> Result<String, AppError> {
        let url = self.cache_busted_url(Utc::now().timestamp_millis());
        let response = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "text/csv")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable(format!(
                "Failed to fetch from sheet: {status}"
            )));
        }
        response
            .text()
            .await
            .map_err(|e| AppError::SourceUnavailable(e.to_string()))
    }

    pub async fn fetch_fallback(&self) -> Result<String, AppError> {
        tokio::fs::read_to_string(&self.fallback_path)
            .await
            .map_err(|e| AppError::FallbackMissing(format!("{}: {e}", self.fallback_path.display())))
    }

    /// Fetch and parse, primary first. Only errors when both sources fail.
    async fn fetch_roster(&self) -> Result<(ParsedRoster, RosterSource), AppError> {
        let primary = match self.fetch_primary().await {
            Ok(raw) => parse::parse(&raw),
            Err(e) => Err(e),
        };
        let primary_err = match primary {
            Ok(roster) => return Ok((roster, RosterSource::Primary)),
            Err(e) => e,
        };
        log::warn!("Failed to fetch from sheet, falling back to local sample: {primary_err}");

        let fallback = match self.fetch_fallback().await {
            Ok(raw) => parse::parse(&raw),
            Err(e) => Err(e),
        };
        match fallback {
            Ok(roster) => Ok((roster, RosterSource::Fallback)),
            Err(fallback_err) => Err(AppError::LoadFailed {
                primary: Box::new(primary_err),
                fallback: Box::new(fallback_err),
            }),
        }
    }

    /// Load and hand the result to the engine while still holding the
    /// in-flight guard, so two refreshes never interleave their replacements.
    pub async fn refresh(&self, engine: &EngineHandle) -> Result<LoadResult<Stats>, AppError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            log::debug!("Roster load already in flight, skipping");
            return Ok(LoadResult::AlreadyRunning);
        };
        match self.fetch_roster().await {
            Ok((roster, source)) => {
                let stats = engine.replace_roster(roster, source).await?;
                Ok(LoadResult::Loaded(stats))
            }
            Err(e) => {
                engine.surface(&e).await?;
                Err(e)
            }
        }
    }

    /// Replace the roster from an operator-supplied CSV. Waits for any
    /// in-flight refresh instead of skipping.
    pub async fn upload(&self, engine: &EngineHandle, raw: &str) -> Result<Stats, AppError> {
        let roster = parse::parse(raw)?;
        let _guard = self.in_flight.lock().await;
        engine.replace_roster(roster, RosterSource::Upload).await
    }
}
