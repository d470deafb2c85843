use actix_web::{
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    error::ErrorUnauthorized,
    middleware::Next,
    web, Error, HttpMessage, HttpResponse,
};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use uuid::Uuid;

use crate::state::AppState;

/// Tenant scope resolved once per request from the session token. Every
/// coordinator call takes its `shop_id` (and, for call-next, the acting
/// barber) from here rather than re-deriving it per handler.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub shop_id: String,
    pub barber_id: Option<String>,
    pub role: String,
}

/// Identity of an authenticated smart-mirror device.
#[derive(Clone, Debug)]
pub struct MirrorContext {
    pub mirror_id: String,
    pub shop_id: String,
    pub device_uid: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    shop_id: String,
    barber_id: Option<String>,
    role: String,
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn session_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err((ErrorUnauthorized("Unauthorized"), req));
    };

    let session = sqlx::query_as::<_, SessionRow>(
        "SELECT shop_id, barber_id, role FROM sessions WHERE token = ? LIMIT 1",
    )
    .bind(credentials.token())
    .fetch_optional(&state.db)
    .await;

    match session {
        Ok(Some(session)) => {
            req.extensions_mut().insert(RequestContext {
                shop_id: session.shop_id,
                barber_id: session.barber_id,
                role: session.role,
            });
            Ok(req)
        }
        Ok(None) => Err((ErrorUnauthorized("Unauthorized"), req)),
        Err(err) => {
            log::error!("Session lookup failed: {err}");
            Err((ErrorUnauthorized("Unauthorized"), req))
        }
    }
}

/// Middleware for the display surface: mirrors authenticate with the
/// device headers issued at registration.
pub async fn mirror_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: actix_web::body::MessageBody + 'static,
{
    let token = header_value(&req, "x-device-token");
    let uid = header_value(&req, "x-device-uid");

    let (Some(token), Some(uid)) = (token, uid) else {
        return Ok(req.into_response(unauthorized("Mirror authentication required")));
    };

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Ok(req.into_response(unauthorized("Mirror authentication required")));
    };

    let mirror = sqlx::query_as::<_, (String, String)>(
        "SELECT id, shop_id FROM mirrors WHERE device_uid = ? AND device_token = ? LIMIT 1",
    )
    .bind(&uid)
    .bind(&token)
    .fetch_optional(&state.db)
    .await;

    match mirror {
        Ok(Some((mirror_id, shop_id))) => {
            req.extensions_mut().insert(MirrorContext {
                mirror_id,
                shop_id,
                device_uid: uid,
            });
            let res = next.call(req).await?;
            Ok(res.map_into_boxed_body())
        }
        Ok(None) => Ok(req.into_response(unauthorized("Unknown mirror device"))),
        Err(err) => {
            log::error!("Mirror lookup failed: {err}");
            Ok(req.into_response(unauthorized("Mirror authentication required")))
        }
    }
}

fn header_value(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn unauthorized(message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "success": false,
        "error": message,
    }))
}
