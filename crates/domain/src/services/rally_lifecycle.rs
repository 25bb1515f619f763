//! Rally lifecycle: scheduling, editing and cancellation.
//!
//! A rally is mutable only while its `rally_date` is in the future.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    DisplayStatus, NewRally, Rally, RallyCancellation, RallyUpdate,
};
use crate::services::clock::Clock;
use crate::stores::{CatalogStore, RallyStore};

pub const MSG_RALLY_NOT_FOUND: &str = "Rally not found";
pub const MSG_NO_EVENTS: &str = "At least one event is required";
pub const MSG_DUPLICATE_EVENTS: &str = "Duplicate events are not allowed";
pub const MSG_REGISTRATION_AFTER_RALLY: &str =
    "Registration ending date must be before rally date";
pub const MSG_RALLY_DATE_PAST: &str = "Rally date must be in the future";
pub const MSG_MODIFY_PAST: &str = "Cannot modify past rallies";
pub const MSG_MODIFY_CANCELLED: &str = "Cannot modify cancelled rallies";
pub const MSG_CANCEL_PAST: &str = "Cannot cancel past rallies";
pub const MSG_ALREADY_CANCELLED: &str = "Rally is already cancelled";

/// Input for scheduling a rally.
#[derive(Debug, Clone)]
pub struct CreateRally {
    pub game_id: Uuid,
    pub type_id: Uuid,
    /// Assignment order follows this list.
    pub event_ids: Vec<Uuid>,
    pub rally_date: DateTime<Utc>,
    pub registration_ending_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Partial rally update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RallyChanges {
    pub rally_date: Option<DateTime<Utc>>,
    pub registration_ending_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Replaces the whole event list when set.
    pub event_ids: Option<Vec<Uuid>>,
}

/// Listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RallyFilter {
    pub status: Option<DisplayStatus>,
    pub game_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct RallyLifecycleService {
    catalog: Arc<dyn CatalogStore>,
    rallies: Arc<dyn RallyStore>,
    clock: Arc<dyn Clock>,
}

fn check_event_list(event_ids: &[Uuid]) -> DomainResult<()> {
    if event_ids.is_empty() {
        return Err(DomainError::validation(MSG_NO_EVENTS));
    }
    let mut seen = HashSet::with_capacity(event_ids.len());
    if !event_ids.iter().all(|id| seen.insert(*id)) {
        return Err(DomainError::validation(MSG_DUPLICATE_EVENTS));
    }
    Ok(())
}

fn check_dates(
    rally_date: DateTime<Utc>,
    registration_ending_date: DateTime<Utc>,
) -> DomainResult<()> {
    if registration_ending_date >= rally_date {
        return Err(DomainError::validation(MSG_REGISTRATION_AFTER_RALLY));
    }
    Ok(())
}

/// Past takes precedence over cancelled.
fn check_mutable(
    rally: &Rally,
    now: DateTime<Utc>,
    past: &str,
    cancelled: &str,
) -> DomainResult<()> {
    if rally.is_past(now) {
        return Err(DomainError::validation(past));
    }
    if rally.is_cancelled() {
        return Err(DomainError::validation(cancelled));
    }
    Ok(())
}

impl RallyLifecycleService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        rallies: Arc<dyn RallyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            rallies,
            clock,
        }
    }

    async fn check_events_belong(&self, game_id: Uuid, event_ids: &[Uuid]) -> DomainResult<()> {
        let events = self.catalog.find_events(event_ids).await?;
        for id in event_ids {
            let usable = events
                .iter()
                .any(|e| e.id == *id && e.is_active && e.game_id == game_id);
            if !usable {
                return Err(DomainError::Validation(format!(
                    "Rally event {} not found, inactive, or not part of the selected game",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Validates and persists a rally with its ordered events.
    ///
    /// The first failing rule is reported, in this order: game usable, type
    /// usable and of that game, each event usable and of that game, event
    /// list present, no duplicate events, registration closes before the
    /// rally, rally in the future.
    pub async fn create_rally(&self, input: CreateRally, creator_id: Uuid) -> DomainResult<Rally> {
        match self.catalog.find_game(input.game_id).await? {
            Some(game) if game.is_active => {}
            _ => return Err(DomainError::validation("Rally game not found or inactive")),
        }
        match self.catalog.find_type(input.type_id).await? {
            Some(t) if t.is_active && t.game_id == input.game_id => {}
            _ => {
                return Err(DomainError::validation(
                    "Rally type not found, inactive, or not part of the selected game",
                ))
            }
        }
        self.check_events_belong(input.game_id, &input.event_ids)
            .await?;

        check_event_list(&input.event_ids)?;
        check_dates(input.rally_date, input.registration_ending_date)?;
        if input.rally_date <= self.clock.now() {
            return Err(DomainError::validation(MSG_RALLY_DATE_PAST));
        }

        let rally = self
            .rallies
            .create(NewRally {
                game_id: input.game_id,
                type_id: input.type_id,
                rally_date: input.rally_date,
                registration_ending_date: input.registration_ending_date,
                notes: input.notes,
                created_by: creator_id,
                event_ids: input.event_ids,
            })
            .await?;

        tracing::info!(
            rally_id = %rally.id,
            created_by = %creator_id,
            rally_date = %rally.rally_date,
            events = rally.events.len(),
            "Rally created"
        );
        Ok(rally)
    }

    /// Explains a guarded write that matched no row: the rally was
    /// removed, passed or cancelled after it was read.
    async fn stale_write(
        &self,
        rally_id: Uuid,
        now: DateTime<Utc>,
        past: &str,
        cancelled: &str,
    ) -> DomainError {
        match self.get_rally(rally_id).await {
            Ok(rally) => check_mutable(&rally, now, past, cancelled)
                .err()
                .unwrap_or_else(|| DomainError::conflict("Rally changed concurrently")),
            Err(err) => err,
        }
    }

    pub async fn get_rally(&self, rally_id: Uuid) -> DomainResult<Rally> {
        self.rallies
            .find(rally_id)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_RALLY_NOT_FOUND))
    }

    pub async fn list_rallies(&self, filter: RallyFilter) -> DomainResult<Vec<Rally>> {
        let rallies = self.rallies.list(filter.game_id).await?;
        let Some(status) = filter.status else {
            return Ok(rallies);
        };
        let now = self.clock.now();
        Ok(rallies
            .into_iter()
            .filter(|r| r.display_status(now) == status)
            .collect())
    }

    pub async fn update_rally(&self, rally_id: Uuid, changes: RallyChanges) -> DomainResult<Rally> {
        let rally = self.get_rally(rally_id).await?;
        let now = self.clock.now();

        check_mutable(&rally, now, MSG_MODIFY_PAST, MSG_MODIFY_CANCELLED)?;
        if let Some(date) = changes.rally_date {
            if date <= now {
                return Err(DomainError::validation(MSG_RALLY_DATE_PAST));
            }
        }

        let rally_date = changes.rally_date.unwrap_or(rally.rally_date);
        let registration_ending_date = changes
            .registration_ending_date
            .unwrap_or(rally.registration_ending_date);
        check_dates(rally_date, registration_ending_date)?;

        if let Some(event_ids) = &changes.event_ids {
            check_event_list(event_ids)?;
            self.check_events_belong(rally.game_id, event_ids).await?;
        }

        let updated = self
            .rallies
            .update(
                rally.id,
                RallyUpdate {
                    rally_date,
                    registration_ending_date,
                    notes: changes.notes.or(rally.notes),
                    event_ids: changes.event_ids,
                },
                now,
            )
            .await?;
        let Some(updated) = updated else {
            return Err(self
                .stale_write(rally_id, now, MSG_MODIFY_PAST, MSG_MODIFY_CANCELLED)
                .await);
        };

        tracing::info!(rally_id = %updated.id, "Rally updated");
        Ok(updated)
    }

    /// Marks a future rally cancelled. Existing registrations are left as they are.
    pub async fn cancel_rally(
        &self,
        rally_id: Uuid,
        admin_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<Rally> {
        let rally = self.get_rally(rally_id).await?;
        let now = self.clock.now();

        check_mutable(&rally, now, MSG_CANCEL_PAST, MSG_ALREADY_CANCELLED)?;

        let cancelled = self
            .rallies
            .cancel(
                rally.id,
                RallyCancellation {
                    reason,
                    cancelled_by: admin_id,
                    cancelled_at: now,
                },
            )
            .await?;
        let Some(cancelled) = cancelled else {
            return Err(self
                .stale_write(rally_id, now, MSG_CANCEL_PAST, MSG_ALREADY_CANCELLED)
                .await);
        };

        tracing::info!(rally_id = %cancelled.id, admin_id = %admin_id, "Rally cancelled");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CatalogEntryChanges, NewCatalogEntry, RallyEvent, RallyGame, RallyStatus, RallyType,
        TemporalStatus,
    };
    use crate::testing::{InMemoryStore, ManualClock};
    use chrono::Duration;

    struct Harness {
        service: RallyLifecycleService,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        game: RallyGame,
        rally_type: RallyType,
        events: Vec<RallyEvent>,
    }

    fn entry(name: &str) -> NewCatalogEntry {
        NewCatalogEntry {
            name: name.to_string(),
            description: None,
        }
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let game = store.create_game(entry("Dirt Rally 2.0")).await.unwrap();
        let rally_type = store.create_type(game.id, entry("Championship")).await.unwrap();
        let mut events = Vec::new();
        for name in ["Monte Carlo", "Sweden", "Wales"] {
            events.push(store.create_event(game.id, entry(name)).await.unwrap());
        }
        let service = RallyLifecycleService::new(store.clone(), store.clone(), clock.clone());
        Harness {
            service,
            store,
            clock,
            game,
            rally_type,
            events,
        }
    }

    impl Harness {
        fn input(&self, rally_in: Duration, registration_in: Duration) -> CreateRally {
            let now = self.clock.now();
            CreateRally {
                game_id: self.game.id,
                type_id: self.rally_type.id,
                event_ids: self.events.iter().map(|e| e.id).collect(),
                rally_date: now + rally_in,
                registration_ending_date: now + registration_in,
                notes: Some("Bring snow tyres".to_string()),
            }
        }

        async fn create(&self) -> Rally {
            self.service
                .create_rally(
                    self.input(Duration::days(10), Duration::days(5)),
                    Uuid::new_v4(),
                )
                .await
                .unwrap()
        }
    }

    fn message(err: DomainError) -> String {
        match err {
            DomainError::Validation(m) => m,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_events_in_order() {
        let h = harness().await;
        let rally = h.create().await;

        assert_eq!(rally.status, RallyStatus::Active);
        let order: Vec<(Uuid, i32)> = rally
            .events
            .iter()
            .map(|s| (s.event_id, s.event_order))
            .collect();
        assert_eq!(
            order,
            vec![
                (h.events[0].id, 1),
                (h.events[1].id, 2),
                (h.events[2].id, 3)
            ]
        );
        assert_eq!(rally.temporal_status(h.clock.now()), TemporalStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_create_validation_order() {
        let h = harness().await;

        let mut input = h.input(Duration::days(-1), Duration::days(1));
        input.event_ids.clear();
        assert_eq!(
            message(h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err()),
            MSG_NO_EVENTS
        );

        let mut input = h.input(Duration::days(-1), Duration::days(1));
        input.event_ids = vec![h.events[0].id, h.events[0].id];
        assert_eq!(
            message(h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err()),
            MSG_DUPLICATE_EVENTS
        );

        let input = h.input(Duration::days(-1), Duration::days(1));
        assert_eq!(
            message(h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err()),
            MSG_REGISTRATION_AFTER_RALLY
        );

        let input = h.input(Duration::days(-1), Duration::days(-2));
        assert_eq!(
            message(h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err()),
            MSG_RALLY_DATE_PAST
        );
    }

    #[tokio::test]
    async fn test_create_rejects_non_increasing_dates() {
        let h = harness().await;
        for (rally_in, reg_in) in [(5, 5), (5, 6), (1, 30)] {
            let input = h.input(Duration::days(rally_in), Duration::days(reg_in));
            assert_eq!(
                message(h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err()),
                MSG_REGISTRATION_AFTER_RALLY
            );
        }
        let input = h.input(Duration::zero(), Duration::days(-1));
        assert_eq!(
            message(h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err()),
            MSG_RALLY_DATE_PAST
        );
    }

    #[tokio::test]
    async fn test_create_checks_catalog() {
        let h = harness().await;

        h.store
            .update_game(
                h.game.id,
                CatalogEntryChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = h
            .service
            .create_rally(h.input(Duration::days(10), Duration::days(5)), Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(message(err), "Rally game not found or inactive");
    }

    #[tokio::test]
    async fn test_create_rejects_type_and_event_from_other_game() {
        let h = harness().await;
        let other = h.store.create_game(entry("WRC 10")).await.unwrap();
        let foreign_type = h.store.create_type(other.id, entry("Arcade")).await.unwrap();
        let foreign_event = h.store.create_event(other.id, entry("Kenya")).await.unwrap();

        let mut input = h.input(Duration::days(10), Duration::days(5));
        input.type_id = foreign_type.id;
        let err = h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err();
        assert!(message(err).starts_with("Rally type"));

        let mut input = h.input(Duration::days(10), Duration::days(5));
        input.event_ids.push(foreign_event.id);
        let err = h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err();
        assert!(message(err).contains(&foreign_event.id.to_string()));

        let mut input = h.input(Duration::days(10), Duration::days(5));
        input.event_ids = vec![Uuid::new_v4()];
        assert!(h.service.create_rally(input, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_status_progression_and_past_update() {
        let h = harness().await;
        let rally = h.create().await;
        let t0 = h.clock.now();

        h.clock.set(t0 + Duration::days(6));
        let current = h.service.get_rally(rally.id).await.unwrap();
        assert_eq!(current.temporal_status(h.clock.now()), TemporalStatus::Active);

        h.clock.set(t0 + Duration::days(11));
        let current = h.service.get_rally(rally.id).await.unwrap();
        assert_eq!(current.temporal_status(h.clock.now()), TemporalStatus::Past);

        let err = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    notes: Some("late".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_MODIFY_PAST);
    }

    #[tokio::test]
    async fn test_update_replaces_events_and_checks_dates() {
        let h = harness().await;
        let rally = h.create().await;
        let now = h.clock.now();

        let updated = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    event_ids: Some(vec![h.events[2].id, h.events[0].id]),
                    registration_ending_date: Some(now + Duration::days(7)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.events.len(), 2);
        assert_eq!(updated.events[0].event_id, h.events[2].id);
        assert_eq!(updated.events[0].event_order, 1);
        assert_eq!(updated.events[1].event_order, 2);
        assert_eq!(updated.registration_ending_date, now + Duration::days(7));
        assert_eq!(updated.notes.as_deref(), Some("Bring snow tyres"));

        let err = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    registration_ending_date: Some(now + Duration::days(12)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_REGISTRATION_AFTER_RALLY);

        let err = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    rally_date: Some(now - Duration::hours(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_RALLY_DATE_PAST);

        let err = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    event_ids: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_NO_EVENTS);
    }

    #[tokio::test]
    async fn test_update_unknown_rally() {
        let h = harness().await;
        let err = h
            .service
            .update_rally(Uuid::new_v4(), RallyChanges::default())
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::not_found(MSG_RALLY_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let h = harness().await;
        let admin_id = Uuid::new_v4();
        let rally = h.create().await;

        let cancelled = h
            .service
            .cancel_rally(rally.id, admin_id, Some("Server maintenance".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, RallyStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(admin_id));
        assert_eq!(cancelled.cancelled_at, Some(h.clock.now()));
        assert_eq!(
            cancelled.display_status(h.clock.now()),
            DisplayStatus::Cancelled
        );

        let err = h
            .service
            .cancel_rally(rally.id, admin_id, None)
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_ALREADY_CANCELLED);

        let err = h
            .service
            .update_rally(rally.id, RallyChanges::default())
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_MODIFY_CANCELLED);
    }

    #[tokio::test]
    async fn test_cancel_past_rally_fails() {
        let h = harness().await;
        let rally = h.create().await;
        h.clock.advance(Duration::days(10));

        let err = h
            .service
            .cancel_rally(rally.id, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_CANCEL_PAST);
    }

    #[tokio::test]
    async fn test_list_filters_by_display_status() {
        let h = harness().await;
        let open = h.create().await;
        let cancelled = h.create().await;
        h.service
            .cancel_rally(cancelled.id, Uuid::new_v4(), None)
            .await
            .unwrap();

        let upcoming = h
            .service
            .list_rallies(RallyFilter {
                status: Some(DisplayStatus::Upcoming),
                game_id: None,
            })
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, open.id);

        let all = h
            .service
            .list_rallies(RallyFilter {
                status: None,
                game_id: Some(h.game.id),
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_create_reports_catalog_before_dates() {
        let h = harness().await;
        h.store
            .update_game(
                h.game.id,
                CatalogEntryChanges {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut input = h.input(Duration::days(-1), Duration::days(1));
        input.event_ids.clear();
        let err = h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(message(err), "Rally game not found or inactive");
    }

    #[tokio::test]
    async fn test_create_reports_foreign_event_before_duplicates() {
        let h = harness().await;
        let other = h.store.create_game(entry("WRC 10")).await.unwrap();
        let foreign_event = h.store.create_event(other.id, entry("Kenya")).await.unwrap();

        let mut input = h.input(Duration::days(-1), Duration::days(1));
        input.event_ids = vec![h.events[0].id, h.events[0].id, foreign_event.id];
        let err = h.service.create_rally(input, Uuid::new_v4()).await.unwrap_err();
        assert!(message(err).contains(&foreign_event.id.to_string()));
    }

    #[tokio::test]
    async fn test_update_and_cancel_after_registration_closes() {
        let h = harness().await;
        let rally = h.create().await;
        h.clock.set(rally.registration_ending_date + Duration::days(1));
        assert_eq!(rally.temporal_status(h.clock.now()), TemporalStatus::Active);

        let updated = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    notes: Some("Stage 3 shortened".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("Stage 3 shortened"));

        let cancelled = h
            .service
            .cancel_rally(rally.id, Uuid::new_v4(), Some("Weather".into()))
            .await
            .unwrap();
        assert_eq!(
            cancelled.display_status(h.clock.now()),
            DisplayStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_rally_date_itself_counts_as_past() {
        let h = harness().await;
        let rally = h.create().await;
        h.clock.set(rally.rally_date);

        let err = h
            .service
            .update_rally(
                rally.id,
                RallyChanges {
                    notes: Some("too late".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_MODIFY_PAST);

        let err = h
            .service
            .cancel_rally(rally.id, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_CANCEL_PAST);

        h.clock.set(rally.rally_date - Duration::seconds(1));
        let cancelled = h
            .service
            .cancel_rally(rally.id, Uuid::new_v4(), None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, RallyStatus::Cancelled);
    }

    /// Cancels the rally right before delegating the next update.
    struct CancelledMidUpdate {
        inner: Arc<InMemoryStore>,
        now: DateTime<Utc>,
    }

    #[async_trait::async_trait]
    impl RallyStore for CancelledMidUpdate {
        async fn create(&self, rally: NewRally) -> DomainResult<Rally> {
            RallyStore::create(self.inner.as_ref(), rally).await
        }

        async fn find(&self, id: Uuid) -> DomainResult<Option<Rally>> {
            RallyStore::find(self.inner.as_ref(), id).await
        }

        async fn list(&self, game_id: Option<Uuid>) -> DomainResult<Vec<Rally>> {
            RallyStore::list(self.inner.as_ref(), game_id).await
        }

        async fn update(
            &self,
            id: Uuid,
            update: RallyUpdate,
            now: DateTime<Utc>,
        ) -> DomainResult<Option<Rally>> {
            let cancellation = RallyCancellation {
                reason: Some("other admin".into()),
                cancelled_by: Uuid::new_v4(),
                cancelled_at: self.now,
            };
            RallyStore::cancel(self.inner.as_ref(), id, cancellation).await?;
            RallyStore::update(self.inner.as_ref(), id, update, now).await
        }

        async fn cancel(
            &self,
            id: Uuid,
            cancellation: RallyCancellation,
        ) -> DomainResult<Option<Rally>> {
            RallyStore::cancel(self.inner.as_ref(), id, cancellation).await
        }
    }

    #[tokio::test]
    async fn test_update_racing_cancel_reports_cancelled() {
        let h = harness().await;
        let rally = h.create().await;
        let racing = RallyLifecycleService::new(
            h.store.clone(),
            Arc::new(CancelledMidUpdate {
                inner: h.store.clone(),
                now: h.clock.now(),
            }),
            h.clock.clone(),
        );

        let err = racing
            .update_rally(
                rally.id,
                RallyChanges {
                    notes: Some("lost update".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message(err), MSG_MODIFY_CANCELLED);

        let stored = h.service.get_rally(rally.id).await.unwrap();
        assert_eq!(stored.notes.as_deref(), Some("Bring snow tyres"));
    }
}
