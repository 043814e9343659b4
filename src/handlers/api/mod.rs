pub mod camera;
pub mod decode;
pub mod status;

use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web,
};

/// Rejects POST requests that aren't `application/json`. The operator page
/// always sends JSON; a plain cross-origin form post cannot.
async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    if req.method() == actix_web::http::Method::POST {
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.starts_with("application/json") {
            let body = serde_json::json!({
                "error": "Content-Type must be application/json for mutation requests"
            });
            let response = HttpResponse::BadRequest().json(body);
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Configure the JSON API used by the operator page.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(actix_web::middleware::from_fn(require_json_content_type))
            .route("/status", web::get().to(status::status))
            .route("/scan", web::post().to(status::manual_scan))
            .route("/cameras", web::post().to(camera::register))
            .route("/camera/start", web::post().to(camera::start))
            .route("/camera/stop", web::post().to(camera::stop))
            .route("/camera/switch", web::post().to(camera::switch))
            .route("/decode", web::post().to(decode::decoded))
            .route("/decode/error", web::post().to(decode::failure)),
    );
}
