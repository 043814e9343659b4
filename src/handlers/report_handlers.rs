use actix_web::{HttpResponse, web};
use chrono::Utc;

use crate::engine::EngineHandle;
use crate::errors::AppError;
use crate::report;

fn csv_download(filename: String, body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(body)
}

/// GET /reports/full.csv
pub async fn full(engine: web::Data<EngineHandle>) -> Result<HttpResponse, AppError> {
    let snapshot = engine.snapshot().await?;
    let body = report::full_report_csv(&snapshot)?;
    let filename = report::full_report_filename(Utc::now().date_naive());
    Ok(csv_download(filename, body))
}

/// GET /reports/present.csv
pub async fn present(engine: web::Data<EngineHandle>) -> Result<HttpResponse, AppError> {
    let snapshot = engine.snapshot().await?;
    let body = report::present_only_csv(&snapshot)?;
    let filename = report::present_report_filename(Utc::now().date_naive());
    Ok(csv_download(filename, body))
}
