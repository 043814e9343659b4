use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::app::SharedCapture;
use crate::capture::browser::BrowserDecoder;
use crate::capture::{Camera, is_handheld};
use crate::errors::AppError;
use crate::live::{LiveEvent, LiveHub};

#[derive(Deserialize)]
pub struct CameraList {
    pub cameras: Vec<Camera>,
}

#[derive(Deserialize, Default)]
pub struct StartRequest {
    pub camera_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SwitchRequest {
    pub camera_id: String,
}

fn user_agent_is_handheld(req: &HttpRequest) -> bool {
    req.headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_handheld)
}

/// POST /api/cameras: the page reports the cameras it can see.
pub async fn register(
    decoder: web::Data<BrowserDecoder>,
    body: web::Json<CameraList>,
) -> Result<HttpResponse, AppError> {
    let cameras = body.into_inner().cameras;
    let count = cameras.len();
    decoder.register_cameras(cameras);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "cameras": count })))
}

/// POST /api/camera/start
pub async fn start(
    req: HttpRequest,
    capture: web::Data<SharedCapture>,
    hub: web::Data<LiveHub>,
    body: web::Json<StartRequest>,
) -> Result<HttpResponse, AppError> {
    let handheld = user_agent_is_handheld(&req);
    let mut session = capture.lock().await;
    let camera_id = session.start(body.camera_id.as_deref(), handheld).await?;
    hub.publish(&LiveEvent::Camera { camera_id: Some(camera_id.clone()) });
    Ok(HttpResponse::Ok().json(session.status()))
}

/// POST /api/camera/stop: no-op when nothing is running.
pub async fn stop(
    capture: web::Data<SharedCapture>,
    hub: web::Data<LiveHub>,
) -> Result<HttpResponse, AppError> {
    let mut session = capture.lock().await;
    session.stop().await?;
    hub.publish(&LiveEvent::Camera { camera_id: None });
    Ok(HttpResponse::Ok().json(session.status()))
}

/// POST /api/camera/switch
pub async fn switch(
    capture: web::Data<SharedCapture>,
    hub: web::Data<LiveHub>,
    body: web::Json<SwitchRequest>,
) -> Result<HttpResponse, AppError> {
    let mut session = capture.lock().await;
    let result = session.switch(&body.camera_id).await;
    hub.publish(&LiveEvent::Camera { camera_id: session.active_camera().map(str::to_string) });
    result?;
    Ok(HttpResponse::Ok().json(session.status()))
}
