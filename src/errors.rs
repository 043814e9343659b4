use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Primary roster source failed (network error or non-2xx status).
    SourceUnavailable(String),
    FallbackMissing(String),
    MissingColumn,
    EmptyResult,
    /// Both roster sources exhausted.
    LoadFailed { primary: Box<AppError>, fallback: Box<AppError> },
    CameraUnavailable,
    CameraPermissionDenied(String),
    CameraSwitchFailed(String),
    /// A second decoding channel was requested while one is active.
    ChannelBusy,
    DecodeChannelError(String),
    ExportFailed(String),
    InvalidUpload(String),
    ConfirmationRequired,
    CsrfRejected,
    EngineClosed,
    Csv(csv::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    Template(askama::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::SourceUnavailable(e) => write!(f, "Roster source unavailable: {e}"),
            AppError::FallbackMissing(e) => write!(f, "Fallback roster missing: {e}"),
            AppError::MissingColumn => write!(f, "CSV must contain a column for Registration Number"),
            AppError::EmptyResult => write!(f, "No valid registration rows found"),
            AppError::LoadFailed { primary, fallback } => {
                write!(f, "Failed to load registration data: {fallback} (primary: {primary})")
            }
            AppError::CameraUnavailable => write!(f, "No camera found"),
            AppError::CameraPermissionDenied(e) => write!(f, "Camera permission denied: {e}"),
            AppError::CameraSwitchFailed(e) => write!(f, "Failed to switch camera: {e}"),
            AppError::ChannelBusy => write!(f, "A decoding channel is already active"),
            AppError::DecodeChannelError(e) => write!(f, "Decoder error: {e}"),
            AppError::ExportFailed(e) => write!(f, "Failed to export report: {e}"),
            AppError::InvalidUpload(e) => write!(f, "Invalid upload: {e}"),
            AppError::ConfirmationRequired => write!(f, "Reset must be confirmed"),
            AppError::CsrfRejected => write!(f, "Invalid or missing CSRF token"),
            AppError::EngineClosed => write!(f, "Attendance engine is not running"),
            AppError::Csv(e) => write!(f, "CSV error: {e}"),
            AppError::Io(e) => write!(f, "I/O error: {e}"),
            AppError::Json(e) => write!(f, "JSON error: {e}"),
            AppError::Template(e) => write!(f, "Template error: {e}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Short machine-readable kind, used in JSON error bodies and live events.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::SourceUnavailable(_) => "source_unavailable",
            AppError::FallbackMissing(_) => "fallback_missing",
            AppError::MissingColumn => "missing_column",
            AppError::EmptyResult => "empty_result",
            AppError::LoadFailed { .. } => "load_failed",
            AppError::CameraUnavailable => "camera_unavailable",
            AppError::CameraPermissionDenied(_) => "camera_permission_denied",
            AppError::CameraSwitchFailed(_) => "camera_switch_failed",
            AppError::ChannelBusy => "channel_busy",
            AppError::DecodeChannelError(_) => "decode_channel_error",
            AppError::ExportFailed(_) => "export_failed",
            AppError::InvalidUpload(_) => "invalid_upload",
            AppError::ConfirmationRequired => "confirmation_required",
            AppError::CsrfRejected => "csrf_rejected",
            AppError::EngineClosed => "engine_closed",
            AppError::Csv(_) => "csv",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Template(_) => "template",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingColumn
            | AppError::EmptyResult
            | AppError::InvalidUpload(_)
            | AppError::ConfirmationRequired
            | AppError::Csv(_) => StatusCode::BAD_REQUEST,
            AppError::ChannelBusy => StatusCode::CONFLICT,
            AppError::CameraUnavailable => StatusCode::NOT_FOUND,
            AppError::CameraPermissionDenied(_) | AppError::CsrfRejected => StatusCode::FORBIDDEN,
            AppError::SourceUnavailable(_)
            | AppError::FallbackMissing(_)
            | AppError::LoadFailed { .. }
            | AppError::EngineClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Csv(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json(e)
    }
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        AppError::Template(e)
    }
}

/// Render an askama template into an HTML response.
pub fn render(tmpl: impl askama::Template) -> Result<HttpResponse, AppError> {
    let body = tmpl.render()?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}
