use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::engine::EngineHandle;
use crate::errors::AppError;
use crate::handlers::csrf::{validate_csrf, validate_csrf_header};
use crate::handlers::flash::{redirect_home, set_flash};
use crate::roster::loader::{LoadResult, RosterLoader};

#[derive(Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// POST /roster/refresh: reload from the sheet (or the bundled sample).
pub async fn refresh(
    loader: web::Data<RosterLoader>,
    engine: web::Data<EngineHandle>,
    session: Session,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, AppError> {
    validate_csrf(&session, &form.csrf_token)?;
    let message = match loader.refresh(&engine).await {
        Ok(LoadResult::Loaded(stats)) => format!("Roster refreshed: {} registrants", stats.total),
        Ok(LoadResult::AlreadyRunning) => "A refresh is already running".to_string(),
        Err(AppError::EngineClosed) => return Err(AppError::EngineClosed),
        Err(e) => e.to_string(),
    };
    set_flash(&session, message);
    Ok(redirect_home())
}

fn is_csv_upload(req: &HttpRequest, filename: Option<&str>) -> bool {
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    content_type.starts_with("text/csv")
        || filename.is_some_and(|name| name.to_lowercase().ends_with(".csv"))
}

/// POST /roster/upload: replace the roster with a CSV sent as the raw body.
/// The CSRF token travels in the `X-CSRF-Token` header.
pub async fn upload(
    req: HttpRequest,
    session: Session,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    loader: web::Data<RosterLoader>,
    engine: web::Data<EngineHandle>,
) -> Result<HttpResponse, AppError> {
    validate_csrf_header(&session, &req)?;
    if !is_csv_upload(&req, query.filename.as_deref()) {
        return Err(AppError::InvalidUpload("Please upload a CSV file".to_string()));
    }
    let text = std::str::from_utf8(&body)
        .map_err(|_| AppError::InvalidUpload("Error reading file".to_string()))?;

    let stats = loader.upload(&engine, text).await?;
    log::info!("Roster replaced from upload: {} registrants", stats.total);
    Ok(HttpResponse::Ok().json(stats))
}
