use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};

use crate::app::SharedCapture;
use crate::capture::is_handheld;
use crate::engine::EngineHandle;
use crate::errors::{AppError, render};
use crate::handlers::csrf::get_or_create_token;
use crate::handlers::flash::take_flash;
use crate::templates_structs::IndexTemplate;

pub async fn index(
    req: HttpRequest,
    engine: web::Data<EngineHandle>,
    capture: web::Data<SharedCapture>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let status = engine.status().await?;
    let capture = capture.lock().await.status();
    let handheld = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_handheld);

    let csrf_token = get_or_create_token(&session);
    let tmpl = IndexTemplate::build(status, capture, take_flash(&session), handheld, csrf_token);
    render(tmpl)
}
