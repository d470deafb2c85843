use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::error::ApiError;
use crate::models::{QueueEntryDetail, QueueStatus};
use crate::notify;
use crate::queue::machine::Event;
use crate::queue::projection::{self, DisplayEntry};
use crate::queue::store::{NewEntry, QueueStore};
use crate::state::{AppState, QueueEvent};

/// Per-customer wait estimate used in the check-in notification text.
const DEFAULT_CUT_MINUTES: i64 = 20;

/// The public queue operations. Stateless besides the pool and the event
/// bus; all synchronisation is delegated to the store's atomic statements,
/// so any number of front-desk, barber and mirror clients can call in
/// concurrently.
#[derive(Clone)]
pub struct Coordinator {
    store: QueueStore,
    events: broadcast::Sender<QueueEvent>,
}

impl Coordinator {
    pub fn new(pool: SqlitePool, events: broadcast::Sender<QueueEvent>) -> Self {
        Self {
            store: QueueStore::new(pool),
            events,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.db.clone(), state.events.clone())
    }

    /// Checks a walk-in into the queue. The entry is visible to `list` and
    /// `call_next` as soon as this returns.
    pub async fn add(&self, shop_id: &str, entry: NewEntry) -> Result<DisplayEntry, ApiError> {
        let customer_name = entry.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(ApiError::Validation("customer_name is required".to_string()));
        }
        let entry = NewEntry { customer_name, ..entry };

        let day = self.store.business_day(shop_id).await?;
        let now = Utc::now();
        let row = self.store.insert_waiting(shop_id, &day, entry, now).await?;
        let detail = self
            .store
            .fetch_detail(&row.id)
            .await?
            .ok_or(ApiError::NotFound)?;

        let waiting = self.store.waiting_positions(shop_id, &day).await?;
        let view = projection::project(detail, &waiting, now);
        let live_position = view.live_position.unwrap_or(1);
        let message = notify::checked_in_message(
            &view.entry.customer_name,
            live_position,
            (live_position - 1).max(0) * DEFAULT_CUT_MINUTES,
        );
        self.emit("customer_checked_in", &view.entry, Some(message));
        Ok(view)
    }

    /// Claims the longest-waiting customer of the day for `barber_id`.
    /// `Ok(None)` means nobody is waiting; not an error.
    pub async fn call_next(
        &self,
        shop_id: &str,
        barber_id: &str,
        mirror_id: Option<&str>,
    ) -> Result<Option<QueueEntryDetail>, ApiError> {
        let day = self.store.business_day(shop_id).await?;
        let Some(row) = self
            .store
            .claim_next(shop_id, &day, barber_id, mirror_id, Utc::now())
            .await?
        else {
            return Ok(None);
        };

        let detail = self
            .store
            .fetch_detail(&row.id)
            .await?
            .ok_or(ApiError::NotFound)?;
        let barber_name = detail
            .assigned_barber_name
            .clone()
            .unwrap_or_else(|| "Your barber".to_string());
        let message = notify::called_message(&detail.customer_name, &barber_name);
        self.emit("customer_called", &detail, Some(message));
        Ok(Some(detail))
    }

    pub async fn start_service(
        &self,
        shop_id: &str,
        entry_id: &str,
    ) -> Result<QueueEntryDetail, ApiError> {
        let row = self
            .store
            .apply_transition(shop_id, entry_id, Event::Start, Utc::now())
            .await?;
        let detail = self
            .store
            .fetch_detail(&row.id)
            .await?
            .ok_or(ApiError::NotFound)?;
        self.emit("service_started", &detail, None);
        Ok(detail)
    }

    pub async fn complete_service(
        &self,
        shop_id: &str,
        entry_id: &str,
    ) -> Result<QueueEntryDetail, ApiError> {
        let row = self
            .store
            .apply_transition(shop_id, entry_id, Event::Complete, Utc::now())
            .await?;

        // Earnings record is best-effort: the transition has committed and
        // a bookkeeping failure must not undo it.
        if let Err(err) = self.store.record_transaction(&row).await {
            log::warn!("Transaction record failed for entry {}: {err}", row.id);
        }

        let detail = self
            .store
            .fetch_detail(&row.id)
            .await?
            .ok_or(ApiError::NotFound)?;
        self.emit("service_completed", &detail, None);
        Ok(detail)
    }

    pub async fn mark_no_show(
        &self,
        shop_id: &str,
        entry_id: &str,
    ) -> Result<QueueEntryDetail, ApiError> {
        let row = self
            .store
            .apply_transition(shop_id, entry_id, Event::NoShow, Utc::now())
            .await?;
        let detail = self
            .store
            .fetch_detail(&row.id)
            .await?
            .ok_or(ApiError::NotFound)?;
        self.emit("marked_no_show", &detail, None);
        Ok(detail)
    }

    /// Today's queue for the shop, arrival order, with the read projection
    /// applied. Defaults to the live view (waiting/called/in_service).
    pub async fn list(
        &self,
        shop_id: &str,
        filter: Option<Vec<QueueStatus>>,
    ) -> Result<Vec<DisplayEntry>, ApiError> {
        let day = self.store.business_day(shop_id).await?;
        let statuses = filter.unwrap_or_else(QueueStatus::live_set);
        let entries = self.store.list_day(shop_id, &day, &statuses).await?;
        let waiting = self.store.waiting_positions(shop_id, &day).await?;
        let now = Utc::now();
        Ok(entries
            .into_iter()
            .map(|entry| projection::project(entry, &waiting, now))
            .collect())
    }

    fn emit(&self, kind: &str, entry: &QueueEntryDetail, message: Option<String>) {
        // No subscribers is fine; delivery is never allowed to fail a
        // transition.
        let _ = self
            .events
            .send(QueueEvent::from_detail(kind, entry, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{seed_barber, seed_service, seed_shop, test_pool};
    use std::collections::BTreeSet;

    async fn setup() -> (Coordinator, SqlitePool, String, tempfile::TempDir) {
        let (pool, dir) = test_pool().await;
        let shop = seed_shop(&pool, 0).await;
        let (events, _) = broadcast::channel(32);
        (Coordinator::new(pool.clone(), events), pool, shop, dir)
    }

    fn walk_in(name: &str) -> NewEntry {
        NewEntry {
            customer_name: name.to_string(),
            ..NewEntry::default()
        }
    }

    #[tokio::test]
    async fn empty_customer_name_is_rejected() {
        let (coordinator, _pool, shop, _dir) = setup().await;
        let err = coordinator.add(&shop, walk_in("   ")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(coordinator.list(&shop, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn walk_in_day_end_to_end() {
        let (coordinator, pool, shop, _dir) = setup().await;
        let barber_a = seed_barber(&pool, &shop, "Marco").await;
        let barber_b = seed_barber(&pool, &shop, "Gina").await;

        let alice = coordinator.add(&shop, walk_in("Alice")).await.unwrap();
        assert_eq!(alice.entry.queue_position, 1);
        assert_eq!(alice.entry.status, QueueStatus::Waiting);

        let bob = coordinator.add(&shop, walk_in("Bob")).await.unwrap();
        assert_eq!(bob.entry.queue_position, 2);

        let called = coordinator
            .call_next(&shop, &barber_a, None)
            .await
            .unwrap()
            .expect("Alice claimed");
        assert_eq!(called.customer_name, "Alice");
        assert_eq!(called.status, QueueStatus::Called);
        assert_eq!(called.assigned_barber_id.as_deref(), Some(barber_a.as_str()));
        assert_eq!(called.assigned_barber_name.as_deref(), Some("Marco"));

        // Alice is no longer waiting, so Bob is next.
        let called = coordinator
            .call_next(&shop, &barber_b, None)
            .await
            .unwrap()
            .expect("Bob claimed");
        assert_eq!(called.customer_name, "Bob");
        assert_eq!(called.assigned_barber_id.as_deref(), Some(barber_b.as_str()));

        let alice_started = coordinator.start_service(&shop, &alice.entry.id).await.unwrap();
        assert_eq!(alice_started.status, QueueStatus::InService);
        assert!(alice_started.service_start_time.is_some());

        let alice_done = coordinator.complete_service(&shop, &alice.entry.id).await.unwrap();
        assert_eq!(alice_done.status, QueueStatus::Completed);
        assert!(alice_done.service_end_time.is_some());
        // Assignment is history now, retained past completion.
        assert_eq!(alice_done.assigned_barber_id.as_deref(), Some(barber_a.as_str()));

        // no_show is legal from `called`.
        let bob_gone = coordinator.mark_no_show(&shop, &bob.entry.id).await.unwrap();
        assert_eq!(bob_gone.status, QueueStatus::NoShow);

        let still_waiting = coordinator
            .list(&shop, Some(vec![QueueStatus::Waiting]))
            .await
            .unwrap();
        assert!(still_waiting.is_empty());
    }

    #[tokio::test]
    async fn call_next_on_an_empty_queue_has_no_side_effects() {
        let (coordinator, pool, shop, _dir) = setup().await;
        let barber = seed_barber(&pool, &shop, "Marco").await;

        let claimed = coordinator.call_next(&shop, &barber, None).await.unwrap();
        assert!(claimed.is_none());

        let all = coordinator
            .list(
                &shop,
                Some(vec![
                    QueueStatus::Waiting,
                    QueueStatus::Called,
                    QueueStatus::InService,
                    QueueStatus::Completed,
                    QueueStatus::NoShow,
                ]),
            )
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn terminal_entries_never_change_again() {
        let (coordinator, pool, shop, _dir) = setup().await;
        let barber = seed_barber(&pool, &shop, "Marco").await;

        let entry = coordinator.add(&shop, walk_in("Alice")).await.unwrap();
        coordinator.call_next(&shop, &barber, None).await.unwrap();
        coordinator.start_service(&shop, &entry.entry.id).await.unwrap();
        let done = coordinator.complete_service(&shop, &entry.entry.id).await.unwrap();

        let err = coordinator.mark_no_show(&shop, &entry.entry.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition { .. }));
        // A repeated complete is the already-applied case.
        let err = coordinator.complete_service(&shop, &entry.entry.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));

        let after = coordinator
            .list(&shop, Some(vec![QueueStatus::Completed]))
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].entry.service_end_time, done.service_end_time);
        assert_eq!(after[0].entry.called_time, done.called_time);
    }

    #[tokio::test]
    async fn list_is_ordered_and_filtered() {
        let (coordinator, pool, shop, _dir) = setup().await;
        let barber = seed_barber(&pool, &shop, "Marco").await;

        for name in ["Alice", "Bob", "Carol"] {
            coordinator.add(&shop, walk_in(name)).await.unwrap();
        }
        coordinator.call_next(&shop, &barber, None).await.unwrap();

        let live = coordinator.list(&shop, None).await.unwrap();
        assert_eq!(live.len(), 3);
        let positions: Vec<i64> = live.iter().map(|e| e.entry.queue_position).collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let waiting = coordinator
            .list(&shop, Some(vec![QueueStatus::Waiting]))
            .await
            .unwrap();
        assert_eq!(waiting.len(), 2);
        assert_eq!(waiting[0].entry.customer_name, "Bob");
        assert_eq!(waiting[0].live_position, Some(1));
        assert_eq!(waiting[1].live_position, Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_get_distinct_increasing_positions() {
        let (coordinator, _pool, shop, _dir) = setup().await;

        let mut handles = Vec::new();
        for n in 0..8 {
            let coordinator = coordinator.clone();
            let shop = shop.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .add(&shop, walk_in(&format!("Walk-in {n}")))
                    .await
            }));
        }

        let mut positions = BTreeSet::new();
        for handle in handles {
            let view = handle.await.unwrap().unwrap();
            assert!(positions.insert(view.entry.queue_position), "duplicate position");
        }
        let expected: BTreeSet<i64> = (1..=8).collect();
        assert_eq!(positions, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_waiting_entry_is_claimed_exactly_once() {
        let (coordinator, pool, shop, _dir) = setup().await;
        let barber = seed_barber(&pool, &shop, "Marco").await;

        coordinator.add(&shop, walk_in("Alice")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = coordinator.clone();
            let shop = shop.clone();
            let barber = barber.clone();
            handles.push(tokio::spawn(async move {
                coordinator.call_next(&shop, &barber, None).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn completing_a_priced_service_records_a_transaction() {
        let (coordinator, pool, shop, _dir) = setup().await;
        let barber = seed_barber(&pool, &shop, "Marco").await;
        let service = seed_service(&pool, &shop, "Fade", 3500).await;

        let entry = coordinator
            .add(
                &shop,
                NewEntry {
                    customer_name: "Alice".to_string(),
                    service_id: Some(service.clone()),
                    ..NewEntry::default()
                },
            )
            .await
            .unwrap();
        coordinator.call_next(&shop, &barber, None).await.unwrap();
        coordinator.start_service(&shop, &entry.entry.id).await.unwrap();
        coordinator.complete_service(&shop, &entry.entry.id).await.unwrap();

        let (count, amount): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount_cents), 0) FROM transactions WHERE queue_entry_id = ?",
        )
        .bind(&entry.entry.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(amount, 3500);
    }

    #[tokio::test]
    async fn call_next_broadcasts_the_ready_message() {
        let (pool, _dir) = test_pool().await;
        let shop = seed_shop(&pool, 0).await;
        let barber = seed_barber(&pool, &shop, "Marco").await;
        let (events, mut rx) = broadcast::channel(32);
        let coordinator = Coordinator::new(pool, events);

        coordinator.add(&shop, walk_in("Alice")).await.unwrap();
        let checked_in = rx.recv().await.unwrap();
        assert_eq!(checked_in.kind, "customer_checked_in");
        assert!(checked_in.message.unwrap().contains("#1 in line"));

        coordinator.call_next(&shop, &barber, None).await.unwrap();
        let called = rx.recv().await.unwrap();
        assert_eq!(called.kind, "customer_called");
        assert_eq!(called.shop_id, shop);
        assert!(called.message.unwrap().contains("Marco is ready"));
    }
}
