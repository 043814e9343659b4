use actix_web::web;

use crate::capture::CaptureSession;
use crate::capture::ChannelEpoch;
use crate::capture::browser::BrowserDecoder;
use crate::config::AppConfig;
use crate::engine::{Clock, Engine, EngineHandle};
use crate::errors::AppError;
use crate::handlers;
use crate::live::LiveHub;
use crate::roster::Stats;
use crate::roster::loader::{LoadResult, RosterLoader};
use crate::roster::scheduler;
use crate::session::SessionStore;

/// The capture session is shared by every worker; its own lock serialises
/// start, stop and switch.
pub type SharedCapture = tokio::sync::Mutex<CaptureSession<BrowserDecoder>>;

/// Everything the HTTP workers share. Built once before the server starts.
#[derive(Clone)]
pub struct AppServices {
    pub config: AppConfig,
    pub engine: EngineHandle,
    pub loader: web::Data<RosterLoader>,
    pub capture: web::Data<SharedCapture>,
    pub decoder: web::Data<BrowserDecoder>,
    pub hub: web::Data<LiveHub>,
}

impl AppServices {
    /// Spawn the engine task and wire the loader and capture session to it.
    /// Must be called from inside the actix runtime.
    pub fn start(config: AppConfig, clock: Clock) -> Self {
        let hub = LiveHub::new();
        let epoch = ChannelEpoch::new();
        let store = SessionStore::new(config.storage_path());
        log::info!("Attendance session {} stored at {}", store.session_id(), store.path().display());

        let (engine, handle, inbox, decode_tx) =
            Engine::new(config.gate, store, hub.clone(), epoch.clone(), clock);
        actix_web::rt::spawn(engine.run(inbox));

        let decoder = BrowserDecoder::new();
        let capture = CaptureSession::new(decoder.clone(), decode_tx, epoch);
        let loader = RosterLoader::new(config.sheet_url.clone(), config.fallback_csv.clone());

        Self {
            config,
            engine: handle,
            loader: web::Data::new(loader),
            capture: web::Data::new(tokio::sync::Mutex::new(capture)),
            decoder: web::Data::new(decoder),
            hub: web::Data::new(hub),
        }
    }

    /// Startup roster load. Failures are already surfaced to the operator
    /// page by the loader; the server still comes up with an empty roster.
    pub async fn initial_load(&self) -> Result<Option<Stats>, AppError> {
        match self.loader.refresh(&self.engine).await {
            Ok(LoadResult::Loaded(stats)) => Ok(Some(stats)),
            Ok(LoadResult::AlreadyRunning) => Ok(None),
            Err(AppError::EngineClosed) => Err(AppError::EngineClosed),
            Err(e) => {
                log::error!("Initial roster load failed: {e}");
                Ok(None)
            }
        }
    }

    pub fn spawn_refresh(&self) {
        scheduler::spawn_refresh(
            self.loader.clone().into_inner(),
            self.engine.clone(),
            self.config.refresh_interval,
        );
    }

    /// Register shared state and every route on an `App`.
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.engine.clone()))
            .app_data(self.loader.clone())
            .app_data(self.capture.clone())
            .app_data(self.decoder.clone())
            .app_data(self.hub.clone())
            .configure(handlers::configure);
    }
}
