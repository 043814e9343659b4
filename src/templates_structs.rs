use askama::Template;

use crate::capture::{Camera, CaptureStatus};
use crate::engine::StatusView;
use crate::gate::ScanOutcome;
use crate::handlers::attendance_handlers::RESET_CONFIRMATION;

/// Last scan result as shown on the operator page.
pub struct ScanBanner {
    pub success: bool,
    pub message: String,
    pub name: String,
    pub reg_no: String,
    pub timestamp: String,
}

impl From<&ScanOutcome> for ScanBanner {
    fn from(outcome: &ScanOutcome) -> Self {
        let message = outcome.message();
        match outcome {
            ScanOutcome::Verified { name, reg_no, timestamp }
            | ScanOutcome::AlreadyPresent { name, reg_no, timestamp } => Self {
                success: true,
                message,
                name: name.clone(),
                reg_no: reg_no.clone(),
                timestamp: timestamp.format("%H:%M:%S").to_string(),
            },
            ScanOutcome::Rejected { reg_no } => Self {
                success: false,
                message,
                name: String::new(),
                reg_no: reg_no.clone(),
                timestamp: String::new(),
            },
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub flash: Option<String>,
    pub total: usize,
    pub present: usize,
    pub locked: bool,
    pub lock_remaining_secs: i64,
    pub banner: Option<ScanBanner>,
    pub last_refresh: String,
    pub roster_source: String,
    pub duplicates: usize,
    pub last_error: Option<String>,
    pub active_camera: Option<String>,
    pub cameras: Vec<Camera>,
    pub handheld: bool,
    pub reset_confirmation: &'static str,
    pub csrf_token: String,
}

impl IndexTemplate {
    pub fn build(
        status: StatusView,
        capture: CaptureStatus,
        flash: Option<String>,
        handheld: bool,
        csrf_token: String,
    ) -> Self {
        Self {
            flash,
            total: status.stats.total,
            present: status.stats.present,
            locked: status.locked,
            lock_remaining_secs: status.lock_remaining_secs.unwrap_or(0),
            banner: status.last_outcome.as_ref().map(ScanBanner::from),
            last_refresh: status
                .last_refresh
                .map(|t| t.format("%H:%M:%S UTC").to_string())
                .unwrap_or_default(),
            roster_source: status.roster_source.map(|s| s.to_string()).unwrap_or_default(),
            duplicates: status.duplicates,
            last_error: status.last_error,
            active_camera: capture.active_camera,
            cameras: capture.cameras,
            handheld,
            reset_confirmation: RESET_CONFIRMATION,
            csrf_token,
        }
    }
}
