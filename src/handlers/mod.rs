pub mod api;
pub mod attendance_handlers;
pub mod csrf;
pub mod dashboard;
pub mod flash;
pub mod live_handlers;
pub mod report_handlers;
pub mod roster_handlers;

use actix_web::web;

/// Operator page, form actions, downloads, websocket and the JSON API.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(dashboard::index))
        .route("/roster/refresh", web::post().to(roster_handlers::refresh))
        .route("/roster/upload", web::post().to(roster_handlers::upload))
        .route("/attendance/reset", web::post().to(attendance_handlers::reset))
        .route("/reports/full.csv", web::get().to(report_handlers::full))
        .route("/reports/present.csv", web::get().to(report_handlers::present))
        .route("/ws", web::get().to(live_handlers::ws_connect))
        .configure(api::configure);
}
