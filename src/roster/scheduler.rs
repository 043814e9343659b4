use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::loader::{LoadResult, RosterLoader};
use crate::engine::EngineHandle;

/// Re-fetch the roster every `period`. The first tick is skipped because the
/// startup load has just run.
pub fn spawn_refresh(loader: Arc<RosterLoader>, engine: EngineHandle, period: Duration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            log::info!("Running scheduled roster refresh");
            match loader.refresh(&engine).await {
                Ok(LoadResult::Loaded(stats)) => {
                    log::info!("Scheduled refresh: {} registrants, {} present", stats.total, stats.present);
                }
                Ok(LoadResult::AlreadyRunning) => {}
                Err(crate::errors::AppError::EngineClosed) => {
                    log::info!("Engine gone, stopping roster refresh");
                    break;
                }
                Err(e) => log::error!("Scheduled roster refresh failed: {e}"),
            }
        }
    });
}
