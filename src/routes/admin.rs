use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    context::{new_id, session_validator, RequestContext},
    error::ApiError,
    models::{BarberRow, MirrorRow, ServiceRow, ROLE_ADMIN},
    state::AppState,
};

#[derive(Deserialize)]
struct NewBarber {
    display_name: String,
}

#[derive(Deserialize)]
struct NewService {
    name: String,
    duration_minutes: i64,
    price_cents: i64,
}

#[derive(Deserialize)]
struct NewMirror {
    name: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .wrap(HttpAuthentication::bearer(session_validator))
            .service(
                web::resource("/barbers")
                    .route(web::get().to(list_barbers))
                    .route(web::post().to(create_barber)),
            )
            .service(
                web::resource("/services")
                    .route(web::get().to(list_services))
                    .route(web::post().to(create_service)),
            )
            .service(
                web::resource("/mirrors")
                    .route(web::get().to(list_mirrors))
                    .route(web::post().to(create_mirror)),
            ),
    );
}

fn require_admin(ctx: &RequestContext) -> Option<HttpResponse> {
    if ctx.role != ROLE_ADMIN {
        return Some(HttpResponse::Forbidden().json(json!({
            "success": false,
            "error": "Admin access required",
        })));
    }
    None
}

async fn list_barbers(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
) -> Result<HttpResponse, ApiError> {
    if let Some(denied) = require_admin(&ctx) {
        return Ok(denied);
    }
    let barbers = sqlx::query_as::<_, BarberRow>(
        "SELECT id, shop_id, display_name, active, created_at FROM barbers WHERE shop_id = ? ORDER BY display_name",
    )
    .bind(&ctx.shop_id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "barbers": barbers })))
}

async fn create_barber(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    body: web::Json<NewBarber>,
) -> Result<HttpResponse, ApiError> {
    if let Some(denied) = require_admin(&ctx) {
        return Ok(denied);
    }
    let display_name = body.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::Validation("display_name is required".to_string()));
    }
    let barber = sqlx::query_as::<_, BarberRow>(
        r#"INSERT INTO barbers (id, shop_id, display_name, active, created_at)
           VALUES (?, ?, ?, 1, ?)
           RETURNING id, shop_id, display_name, active, created_at"#,
    )
    .bind(new_id())
    .bind(&ctx.shop_id)
    .bind(display_name)
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "barber": barber })))
}

async fn list_services(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
) -> Result<HttpResponse, ApiError> {
    if let Some(denied) = require_admin(&ctx) {
        return Ok(denied);
    }
    let services = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, shop_id, name, duration_minutes, price_cents, active FROM services WHERE shop_id = ? AND active = 1 ORDER BY name",
    )
    .bind(&ctx.shop_id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "services": services })))
}

async fn create_service(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    body: web::Json<NewService>,
) -> Result<HttpResponse, ApiError> {
    if let Some(denied) = require_admin(&ctx) {
        return Ok(denied);
    }
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    let service = sqlx::query_as::<_, ServiceRow>(
        r#"INSERT INTO services (id, shop_id, name, duration_minutes, price_cents, active)
           VALUES (?, ?, ?, ?, ?, 1)
           RETURNING id, shop_id, name, duration_minutes, price_cents, active"#,
    )
    .bind(new_id())
    .bind(&ctx.shop_id)
    .bind(name)
    .bind(body.duration_minutes)
    .bind(body.price_cents)
    .fetch_one(&state.db)
    .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "service": service })))
}

async fn list_mirrors(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
) -> Result<HttpResponse, ApiError> {
    if let Some(denied) = require_admin(&ctx) {
        return Ok(denied);
    }
    let mirrors = sqlx::query_as::<_, MirrorRow>(
        "SELECT id, shop_id, name, device_uid, device_token, created_at FROM mirrors WHERE shop_id = ? ORDER BY name",
    )
    .bind(&ctx.shop_id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "mirrors": mirrors })))
}

/// Registers a mirror device and hands back its credentials; the device
/// presents them as `x-device-uid` / `x-device-token` from then on.
async fn create_mirror(
    state: web::Data<AppState>,
    ctx: web::ReqData<RequestContext>,
    body: web::Json<NewMirror>,
) -> Result<HttpResponse, ApiError> {
    if let Some(denied) = require_admin(&ctx) {
        return Ok(denied);
    }
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    let mirror = sqlx::query_as::<_, MirrorRow>(
        r#"INSERT INTO mirrors (id, shop_id, name, device_uid, device_token, created_at)
           VALUES (?, ?, ?, ?, ?, ?)
           RETURNING id, shop_id, name, device_uid, device_token, created_at"#,
    )
    .bind(new_id())
    .bind(&ctx.shop_id)
    .bind(name)
    .bind(new_id())
    .bind(new_id())
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "mirror": mirror })))
}
