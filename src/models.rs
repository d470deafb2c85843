use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_BARBER: &str = "barber";
pub const ROLE_FRONT_DESK: &str = "front_desk";

/// Lifecycle of a walk-in visit. Stored as snake_case TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Called,
    InService,
    Completed,
    NoShow,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::Called => "called",
            QueueStatus::InService => "in_service",
            QueueStatus::Completed => "completed",
            QueueStatus::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(QueueStatus::Waiting),
            "called" => Some(QueueStatus::Called),
            "in_service" => Some(QueueStatus::InService),
            "completed" => Some(QueueStatus::Completed),
            "no_show" => Some(QueueStatus::NoShow),
            _ => None,
        }
    }

    /// The live operational view: everything except terminal states.
    pub fn live_set() -> Vec<QueueStatus> {
        vec![QueueStatus::Waiting, QueueStatus::Called, QueueStatus::InService]
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QueueEntryRow {
    pub id: String,
    pub shop_id: String,
    pub business_day: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub service_id: Option<String>,
    pub preferred_barber_id: Option<String>,
    pub assigned_barber_id: Option<String>,
    pub assigned_mirror_id: Option<String>,
    pub queue_position: i64,
    pub status: QueueStatus,
    pub check_in_time: DateTime<Utc>,
    pub called_time: Option<DateTime<Utc>>,
    pub service_start_time: Option<DateTime<Utc>>,
    pub service_end_time: Option<DateTime<Utc>>,
}

/// Queue entry with display names joined from the lookup tables.
/// The queue itself stores only foreign keys.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QueueEntryDetail {
    pub id: String,
    pub shop_id: String,
    pub business_day: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub preferred_barber_id: Option<String>,
    pub preferred_barber_name: Option<String>,
    pub assigned_barber_id: Option<String>,
    pub assigned_barber_name: Option<String>,
    pub assigned_mirror_id: Option<String>,
    pub queue_position: i64,
    pub status: QueueStatus,
    pub check_in_time: DateTime<Utc>,
    pub called_time: Option<DateTime<Utc>>,
    pub service_start_time: Option<DateTime<Utc>>,
    pub service_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BarberRow {
    pub id: String,
    pub shop_id: String,
    pub display_name: String,
    pub active: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MirrorRow {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub device_uid: String,
    pub device_token: String,
    pub created_at: DateTime<Utc>,
}
