use actix_session::Session;
use actix_web::HttpResponse;

/// Store a one-shot message for the next page render.
pub fn set_flash(session: &Session, message: impl Into<String>) {
    let _ = session.insert("flash", message.into());
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

/// 303 back to the operator page.
pub fn redirect_home() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", "/"))
        .finish()
}
