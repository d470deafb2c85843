use actix_web::{http::header, middleware::from_fn, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    context::{mirror_guard, MirrorContext},
    error::ApiError,
    queue::{coordinator::Coordinator, store::NewEntry},
    routes::events::event_to_bytes,
    state::AppState,
};

#[derive(Deserialize)]
struct CheckInBody {
    customer_name: String,
    customer_phone: Option<String>,
    service_id: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/display")
            .wrap(from_fn(mirror_guard))
            .service(web::resource("/queue").route(web::get().to(live_queue)))
            .service(web::resource("/events").route(web::get().to(stream_events)))
            .service(web::resource("/checkin").route(web::post().to(kiosk_check_in))),
    );
}

/// The live view a mirror renders: waiting/called/in-service customers with
/// wait times and live positions.
async fn live_queue(
    state: web::Data<AppState>,
    mirror: web::ReqData<MirrorContext>,
) -> Result<HttpResponse, ApiError> {
    let queue = Coordinator::from_state(&state)
        .list(&mirror.shop_id, None)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "queue": queue })))
}

async fn stream_events(
    state: web::Data<AppState>,
    mirror: web::ReqData<MirrorContext>,
) -> HttpResponse {
    let shop_id = mirror.shop_id.clone();
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

/// Self check-in from the kiosk screen, throttled per device.
async fn kiosk_check_in(
    state: web::Data<AppState>,
    mirror: web::ReqData<MirrorContext>,
    body: web::Json<CheckInBody>,
) -> Result<HttpResponse, ApiError> {
    if !state.kiosk_limiter.allow(&mirror.device_uid) {
        return Ok(HttpResponse::TooManyRequests().json(json!({
            "success": false,
            "error": "too many check-ins, please ask the front desk",
        })));
    }

    let body = body.into_inner();
    let entry = Coordinator::from_state(&state)
        .add(
            &mirror.shop_id,
            NewEntry {
                customer_name: body.customer_name,
                customer_phone: body.customer_phone,
                service_id: body.service_id,
                ..NewEntry::default()
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "entry": entry })))
}
