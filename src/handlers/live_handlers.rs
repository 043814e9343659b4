use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::Message;

use crate::live::LiveHub;

/// GET /ws: live scan outcomes, lock countdown and roster events.
pub async fn ws_connect(
    req: HttpRequest,
    body: web::Payload,
    hub: web::Data<LiveHub>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let mut rx = hub.subscribe();
    let hub = hub.into_inner();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    if ws_session.text(msg).await.is_err() {
                        break;
                    }
                }
                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if ws_session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        // Operator actions go through the HTTP routes.
                        _ => {}
                    }
                }
                else => break,
            }
        }

        drop(rx);
        hub.prune();
    });

    Ok(response)
}
