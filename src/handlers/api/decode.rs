use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::capture::browser::BrowserDecoder;
use crate::errors::AppError;

#[derive(Deserialize)]
pub struct Decoded {
    /// Missing or non-string payloads arrive as an empty code.
    #[serde(default)]
    pub text: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct DecoderFailure {
    #[serde(default)]
    pub message: String,
}

/// POST /api/decode: one decode callback from the page's QR decoder.
pub async fn decoded(
    decoder: web::Data<BrowserDecoder>,
    body: web::Json<Decoded>,
) -> Result<HttpResponse, AppError> {
    let text = match body.into_inner().text {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };
    let accepted = decoder.push_decoded(text);
    Ok(HttpResponse::Accepted().json(serde_json::json!({ "accepted": accepted })))
}

/// POST /api/decode/error: decoder failure callback.
pub async fn failure(
    decoder: web::Data<BrowserDecoder>,
    body: web::Json<DecoderFailure>,
) -> Result<HttpResponse, AppError> {
    let accepted = decoder.push_error(body.into_inner().message);
    Ok(HttpResponse::Accepted().json(serde_json::json!({ "accepted": accepted })))
}
