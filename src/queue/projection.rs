use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{QueueEntryDetail, QueueStatus};

/// Queue entry enriched with display-only fields. Recomputed on every read,
/// never persisted: `queue_position` stays the immutable arrival ticket,
/// `live_position` is the rank among customers still waiting.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayEntry {
    #[serde(flatten)]
    pub entry: QueueEntryDetail,
    pub wait_time_minutes: i64,
    pub live_position: Option<i64>,
}

pub fn project(
    entry: QueueEntryDetail,
    waiting_positions: &[i64],
    now: DateTime<Utc>,
) -> DisplayEntry {
    let wait_time_minutes = (now - entry.check_in_time).num_seconds().max(0) / 60;
    let live_position = if entry.status == QueueStatus::Waiting {
        let ahead = waiting_positions
            .iter()
            .filter(|position| **position < entry.queue_position)
            .count() as i64;
        Some(ahead + 1)
    } else {
        None
    };
    DisplayEntry {
        entry,
        wait_time_minutes,
        live_position,
    }
}
