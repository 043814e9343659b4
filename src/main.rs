use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware};

use rollcall::app::AppServices;
use rollcall::config::AppConfig;
use rollcall::engine::system_clock;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let services = AppServices::start(config.clone(), system_clock());
    match services.initial_load().await {
        Ok(Some(stats)) => log::info!("Roster ready: {} registrants, {} present", stats.total, stats.present),
        Ok(None) => log::warn!("Starting without a roster; use Refresh Data or upload a CSV"),
        Err(e) => {
            log::error!("Attendance engine failed to start: {e}");
            return Err(std::io::Error::other(e.to_string()));
        }
    }
    services.spawn_refresh();

    // Flash messages ride in the session cookie. Set SESSION_KEY to keep them across restarts.
    let secret_key = match std::env::var("SESSION_KEY") {
        Ok(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Ok(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
            Key::generate()
        }
        Err(_) => Key::generate(),
    };

    log::info!("Starting server at http://{}", config.bind_addr);

    let engine = services.engine.clone();
    let capture = services.capture.clone();
    let server = HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
            .cookie_secure(false)
            .cookie_http_only(true)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .service(actix_files::Files::new("/static", "./static"))
            .configure(|cfg| services.register(cfg))
    })
    .bind(&config.bind_addr)?
    .run();

    let result = server.await;

    // Release the decode channel before the engine goes away.
    if let Err(e) = capture.lock().await.stop().await {
        log::warn!("Failed to stop capture on shutdown: {e}");
    }
    engine.shutdown().await;
    result
}
