use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    context::{session_validator, RequestContext},
    error::ApiError,
    models::QueueStatus,
    queue::{coordinator::Coordinator, store::NewEntry},
    state::AppState,
};

#[derive(Deserialize)]
struct ListQuery {
    status: Option<String>,
}

#[derive(Deserialize)]
struct AddBody {
    customer_name: String,
    customer_id: Option<String>,
    customer_phone: Option<String>,
    service_id: Option<String>,
    preferred_barber_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct CallNextBody {
    mirror_id: Option<String>,
    // Front-desk sessions carry no barber; they must say who is calling.
    barber_id: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/queue")
            .wrap(HttpAuthentication::bearer(session_validator))
            .service(
                web::resource("")
                    .route(web::get().to(list))
                    .route(web::post().to(add)),
            )
            .service(web::resource("/call-next").route(web::post().to(call_next)))
            .service(web::resource("/{id}/start").route(web::post().to(start)))
            .service(web::resource("/{id}/complete").route(web::post().to(complete)))
            .service(web::resource("/{id}/noshow").route(web::post().to(no_show))),
    );
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<Vec<QueueStatus>>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut statuses = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let status = QueueStatus::parse(part)
            .ok_or_else(|| ApiError::Validation(format!("unknown status '{part}'")))?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    if statuses.is_empty() {
        return Ok(None);
    }
    Ok(Some(statuses))
}

async fn list(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = parse_status_filter(query.status.as_deref())?;
    let queue = Coordinator::from_state(&state)
        .list(&ctx.shop_id, filter)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "queue": queue })))
}

async fn add(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    body: web::Json<AddBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let entry = Coordinator::from_state(&state)
        .add(
            &ctx.shop_id,
            NewEntry {
                customer_id: body.customer_id,
                customer_name: body.customer_name,
                customer_phone: body.customer_phone,
                service_id: body.service_id,
                preferred_barber_id: body.preferred_barber_id,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "entry": entry })))
}

async fn call_next(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    body: Option<web::Json<CallNextBody>>,
) -> Result<HttpResponse, ApiError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let barber_id = ctx
        .barber_id
        .clone()
        .or(body.barber_id)
        .ok_or_else(|| ApiError::Validation("barber identity required".to_string()))?;

    let claimed = Coordinator::from_state(&state)
        .call_next(&ctx.shop_id, &barber_id, body.mirror_id.as_deref())
        .await?;

    match claimed {
        Some(entry) => Ok(HttpResponse::Ok().json(json!({ "success": true, "entry": entry }))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "no customers waiting",
        }))),
    }
}

async fn start(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let entry = Coordinator::from_state(&state)
        .start_service(&ctx.shop_id, &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "entry": entry })))
}

async fn complete(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let entry = Coordinator::from_state(&state)
        .complete_service(&ctx.shop_id, &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "entry": entry })))
}

async fn no_show(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let entry = Coordinator::from_state(&state)
        .mark_no_show(&ctx.shop_id, &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "entry": entry })))
}
