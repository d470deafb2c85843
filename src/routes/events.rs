use actix_web::{http::header, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    context::{session_validator, RequestContext},
    state::{AppState, QueueEvent},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/events")
            .wrap(HttpAuthentication::bearer(session_validator))
            .route(web::get().to(stream_events)),
    );
}

/// SSE feed of queue transitions for the session's shop. This is the
/// notification-dispatch surface: SMS bridges and dashboards subscribe here.
async fn stream_events(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
) -> HttpResponse {
    let shop_id = ctx.shop_id.clone();
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.shop_id == shop_id => {
            Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event)))
        }
        _ => None,
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

pub fn event_to_bytes(event: &QueueEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: queue\ndata: {}\n\n", payload))
}
