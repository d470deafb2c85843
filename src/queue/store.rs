use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::context::new_id;
use crate::error::ApiError;
use crate::models::{QueueEntryDetail, QueueEntryRow, QueueStatus};
use crate::queue::machine::{self, Event};

const ENTRY_COLUMNS: &str = "id, shop_id, business_day, customer_id, customer_name, \
     customer_phone, service_id, preferred_barber_id, assigned_barber_id, \
     assigned_mirror_id, queue_position, status, check_in_time, called_time, \
     service_start_time, service_end_time";

const DETAIL_SELECT: &str = "SELECT e.id, e.shop_id, e.business_day, e.customer_id, e.customer_name, \
            e.customer_phone, e.service_id, s.name AS service_name, \
            e.preferred_barber_id, p.display_name AS preferred_barber_name, \
            e.assigned_barber_id, b.display_name AS assigned_barber_name, \
            e.assigned_mirror_id, e.queue_position, e.status, e.check_in_time, \
            e.called_time, e.service_start_time, e.service_end_time \
     FROM queue_entries e \
     LEFT JOIN services s ON e.service_id = s.id \
     LEFT JOIN barbers b ON e.assigned_barber_id = b.id \
     LEFT JOIN barbers p ON e.preferred_barber_id = p.id";

/// Fields supplied by the caller when a walk-in checks in. Position, status
/// and timestamps are the store's business.
#[derive(Debug, Default, Clone)]
pub struct NewEntry {
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub service_id: Option<String>,
    pub preferred_barber_id: Option<String>,
}

/// All SQL touching queue rows lives here. Every mutation is a single
/// conditional statement so concurrent callers race on the database, not in
/// process memory.
#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
}

pub fn local_day(now: DateTime<Utc>, utc_offset_minutes: i64) -> String {
    (now + Duration::minutes(utc_offset_minutes))
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

impl QueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current business day in the shop's local calendar.
    pub async fn business_day(&self, shop_id: &str) -> Result<String, ApiError> {
        let offset = sqlx::query_scalar::<_, i64>(
            "SELECT utc_offset_minutes FROM shops WHERE id = ? LIMIT 1",
        )
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(offset) = offset else {
            // The tenant resolver should never hand us an unknown shop.
            log::error!("Unknown shop id {shop_id} reached the queue store");
            return Err(ApiError::NotFound);
        };

        Ok(local_day(Utc::now(), offset))
    }

    /// Inserts a `waiting` entry with the next arrival ticket for the
    /// shop-day. The counter bump is a single upsert and commits in the same
    /// transaction as the insert, so concurrent check-ins always get
    /// distinct, increasing positions.
    pub async fn insert_waiting(
        &self,
        shop_id: &str,
        business_day: &str,
        entry: NewEntry,
        now: DateTime<Utc>,
    ) -> Result<QueueEntryRow, ApiError> {
        let mut tx = self.pool.begin().await?;

        let position = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO queue_counters (shop_id, business_day, next_position)
               VALUES (?, ?, 1)
               ON CONFLICT(shop_id, business_day)
               DO UPDATE SET next_position = next_position + 1
               RETURNING next_position"#,
        )
        .bind(shop_id)
        .bind(business_day)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            r#"INSERT INTO queue_entries
               (id, shop_id, business_day, customer_id, customer_name, customer_phone,
                service_id, preferred_barber_id, queue_position, status, check_in_time)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING {ENTRY_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, QueueEntryRow>(&sql)
            .bind(new_id())
            .bind(shop_id)
            .bind(business_day)
            .bind(&entry.customer_id)
            .bind(&entry.customer_name)
            .bind(&entry.customer_phone)
            .bind(&entry.service_id)
            .bind(&entry.preferred_barber_id)
            .bind(position)
            .bind(QueueStatus::Waiting)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Claims the minimum-position `waiting` entry of the shop-day for a
    /// barber. Selection and update are one statement with a status guard,
    /// so of any number of concurrent callers exactly one wins each entry.
    /// `None` means the queue is empty, an expected outcome.
    pub async fn claim_next(
        &self,
        shop_id: &str,
        business_day: &str,
        barber_id: &str,
        mirror_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueEntryRow>, ApiError> {
        let sql = format!(
            r#"UPDATE queue_entries
               SET status = ?, assigned_barber_id = ?, assigned_mirror_id = ?, called_time = ?
               WHERE id = (
                   SELECT id FROM queue_entries
                   WHERE shop_id = ? AND business_day = ? AND status = ?
                   ORDER BY queue_position ASC
                   LIMIT 1
               ) AND status = ?
               RETURNING {ENTRY_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, QueueEntryRow>(&sql)
            .bind(QueueStatus::Called)
            .bind(barber_id)
            .bind(mirror_id)
            .bind(now)
            .bind(shop_id)
            .bind(business_day)
            .bind(QueueStatus::Waiting)
            .bind(QueueStatus::Waiting)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Applies `start`/`complete`/`no_show` to a specific entry as an atomic
    /// conditional update, scoped to the caller's shop so an id from another
    /// tenant reads as missing. A zero-row result is re-read once to tell a
    /// missing entry from one that changed state under us.
    pub async fn apply_transition(
        &self,
        shop_id: &str,
        entry_id: &str,
        event: Event,
        now: DateTime<Utc>,
    ) -> Result<QueueEntryRow, ApiError> {
        let target = match event {
            Event::Start => QueueStatus::InService,
            Event::Complete => QueueStatus::Completed,
            Event::NoShow => QueueStatus::NoShow,
            // `call` must go through claim_next, which also assigns.
            Event::Call => {
                log::error!("apply_transition called with Event::Call");
                return Err(ApiError::NotFound);
            }
        };

        let stamp_column = match event {
            Event::Start => ", service_start_time = ?",
            Event::Complete => ", service_end_time = ?",
            _ => "",
        };

        let priors = machine::prior_states(event);
        let guards = vec!["?"; priors.len()].join(", ");
        let sql = format!(
            r#"UPDATE queue_entries
               SET status = ?{stamp_column}
               WHERE id = ? AND shop_id = ? AND status IN ({guards})
               RETURNING {ENTRY_COLUMNS}"#
        );

        let mut query = sqlx::query_as::<_, QueueEntryRow>(&sql).bind(target);
        if !stamp_column.is_empty() {
            query = query.bind(now);
        }
        query = query.bind(entry_id).bind(shop_id);
        for prior in priors {
            query = query.bind(prior);
        }

        if let Some(row) = query.fetch_optional(&self.pool).await? {
            return Ok(row);
        }

        // Lost the conditional update: either the entry never existed or
        // another caller moved it first.
        match self.fetch_entry(entry_id).await? {
            None => Err(ApiError::NotFound),
            // Another shop's entry is indistinguishable from a missing one.
            Some(current) if current.shop_id != shop_id => {
                log::debug!("entry {entry_id} requested by shop {shop_id} belongs elsewhere");
                Err(ApiError::NotFound)
            }
            Some(current) if current.status == target => {
                log::info!(
                    "{} on entry {entry_id} raced: already {:?}",
                    event.name(),
                    current.status
                );
                Err(ApiError::Conflict { status: current.status })
            }
            Some(current) => {
                log::debug!(
                    "{} rejected for entry {entry_id}: status is {:?}",
                    event.name(),
                    current.status
                );
                Err(ApiError::InvalidTransition {
                    from: current.status,
                    event: event.name(),
                })
            }
        }
    }

    pub async fn fetch_entry(&self, entry_id: &str) -> Result<Option<QueueEntryRow>, ApiError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE id = ? LIMIT 1");
        Ok(sqlx::query_as::<_, QueueEntryRow>(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn fetch_detail(&self, entry_id: &str) -> Result<Option<QueueEntryDetail>, ApiError> {
        let sql = format!("{DETAIL_SELECT} WHERE e.id = ? LIMIT 1");
        Ok(sqlx::query_as::<_, QueueEntryDetail>(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Today's entries in the requested statuses, arrival order.
    pub async fn list_day(
        &self,
        shop_id: &str,
        business_day: &str,
        statuses: &[QueueStatus],
    ) -> Result<Vec<QueueEntryDetail>, ApiError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "{DETAIL_SELECT} \
             WHERE e.shop_id = ? AND e.business_day = ? AND e.status IN ({placeholders}) \
             ORDER BY e.queue_position ASC"
        );
        let mut query = sqlx::query_as::<_, QueueEntryDetail>(&sql)
            .bind(shop_id)
            .bind(business_day);
        for status in statuses {
            query = query.bind(status);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Positions of entries still waiting, ascending. Input to the live
    /// position projection.
    pub async fn waiting_positions(
        &self,
        shop_id: &str,
        business_day: &str,
    ) -> Result<Vec<i64>, ApiError> {
        let positions = sqlx::query_scalar::<_, i64>(
            r#"SELECT queue_position FROM queue_entries
               WHERE shop_id = ? AND business_day = ? AND status = ?
               ORDER BY queue_position ASC"#,
        )
        .bind(shop_id)
        .bind(business_day)
        .bind(QueueStatus::Waiting)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    /// Earnings record written after a completed cut. Best-effort from the
    /// coordinator's point of view; requires a priced service on the entry.
    pub async fn record_transaction(&self, entry: &QueueEntryRow) -> Result<(), ApiError> {
        let Some(service_id) = entry.service_id.as_deref() else {
            return Ok(());
        };
        let service = sqlx::query_as::<_, (String, i64)>(
            "SELECT name, price_cents FROM services WHERE id = ? LIMIT 1",
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((service_name, price_cents)) = service else {
            return Ok(());
        };

        sqlx::query(
            r#"INSERT INTO transactions (id, queue_entry_id, shop_id, amount_cents, service_name, client_name, occurred_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(&entry.id)
        .bind(&entry.shop_id)
        .bind(price_cents)
        .bind(service_name)
        .bind(&entry.customer_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
