use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::limit::RateLimiter;
use crate::models::QueueEntryDetail;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<QueueEvent>,
    pub kiosk_limiter: Arc<RateLimiter>,
}

/// Transition event published on the broadcast bus. External notifiers
/// (SMS bridge, mirror displays) subscribe over SSE; nothing here can roll
/// a queue transition back.
#[derive(Clone, Debug, Serialize)]
pub struct QueueEvent {
    pub kind: String,
    pub entry_id: String,
    pub shop_id: String,
    pub status: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub queue_position: i64,
    pub service_name: Option<String>,
    pub assigned_barber_id: Option<String>,
    pub assigned_barber_name: Option<String>,
    pub assigned_mirror_id: Option<String>,
    pub message: Option<String>,
}

impl QueueEvent {
    pub fn from_detail(kind: &str, entry: &QueueEntryDetail, message: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            entry_id: entry.id.clone(),
            shop_id: entry.shop_id.clone(),
            status: entry.status.as_str().to_string(),
            customer_name: entry.customer_name.clone(),
            customer_phone: entry.customer_phone.clone(),
            queue_position: entry.queue_position,
            service_name: entry.service_name.clone(),
            assigned_barber_id: entry.assigned_barber_id.clone(),
            assigned_barber_name: entry.assigned_barber_name.clone(),
            assigned_mirror_id: entry.assigned_mirror_id.clone(),
            message,
        }
    }
}
