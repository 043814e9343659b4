use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::engine::EngineHandle;
use crate::errors::AppError;
use crate::handlers::csrf::validate_csrf;
use crate::handlers::flash::{redirect_home, set_flash};

pub const RESET_CONFIRMATION: &str = "RESET";

#[derive(Deserialize)]
pub struct ResetForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub confirm: String,
}

/// POST /attendance/reset: drop every check-in. Irreversible, so the form
/// must carry `confirm=RESET` along with the session's CSRF token.
pub async fn reset(
    engine: web::Data<EngineHandle>,
    session: Session,
    form: web::Form<ResetForm>,
) -> Result<HttpResponse, AppError> {
    validate_csrf(&session, &form.csrf_token)?;
    if form.confirm.trim() != RESET_CONFIRMATION {
        return Err(AppError::ConfirmationRequired);
    }
    let stats = engine.reset().await?;
    set_flash(&session, format!("Attendance reset ({} registrants, none present)", stats.total));
    Ok(redirect_home())
}
