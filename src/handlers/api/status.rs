use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::app::SharedCapture;
use crate::capture::CaptureStatus;
use crate::engine::{EngineHandle, StatusView};
use crate::errors::AppError;
use crate::gate::{ScanDecision, ScanOutcome, countdown_secs};

#[derive(Serialize)]
pub struct ApiStatus {
    #[serde(flatten)]
    pub engine: StatusView,
    pub capture: CaptureStatus,
}

/// GET /api/status
pub async fn status(
    engine: web::Data<EngineHandle>,
    capture: web::Data<SharedCapture>,
) -> Result<HttpResponse, AppError> {
    let engine = engine.status().await?;
    let capture = capture.lock().await.status();
    Ok(HttpResponse::Ok().json(ApiStatus { engine, capture }))
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub code: String,
}

#[derive(Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApiScanDecision {
    Processed {
        outcome: ScanOutcome,
        message: String,
        locked: bool,
    },
    Cooldown,
    Locked {
        remaining_secs: i64,
    },
}

impl From<ScanDecision> for ApiScanDecision {
    fn from(decision: ScanDecision) -> Self {
        match decision {
            ScanDecision::Processed { outcome, locked } => ApiScanDecision::Processed {
                message: outcome.message(),
                outcome,
                locked,
            },
            ScanDecision::Cooldown => ApiScanDecision::Cooldown,
            ScanDecision::Locked { remaining } => ApiScanDecision::Locked {
                remaining_secs: countdown_secs(remaining),
            },
        }
    }
}

/// POST /api/scan: typed-in registration number, same rules as a camera scan.
pub async fn manual_scan(
    engine: web::Data<EngineHandle>,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    let decision = engine.scan(body.into_inner().code).await?;
    Ok(HttpResponse::Ok().json(ApiScanDecision::from(decision)))
}
