//! Rally repository. A rally row is always loaded together with its
//! ordered event assignments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{NewRally, Rally, RallyCancellation, RallyEventSlot, RallyUpdate};
use domain::stores::RallyStore;
use domain::DomainResult;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::{RallyEntity, RallyEventAssignmentEntity};
use crate::metrics::QueryTimer;

const RALLY_COLUMNS: &str = "id, game_id, type_id, rally_date, registration_ending_date, notes, \
     status, cancellation_reason, cancelled_by, cancelled_at, created_by, created_at, updated_at";

/// Event ids in submission order become slots numbered from 1.
fn slots_for(event_ids: &[Uuid]) -> Vec<RallyEventSlot> {
    event_ids
        .iter()
        .zip(1..)
        .map(|(event_id, event_order)| RallyEventSlot {
            event_id: *event_id,
            event_order,
        })
        .collect()
}

async fn insert_assignments(
    tx: &mut Transaction<'_, Postgres>,
    rally_id: Uuid,
    slots: &[RallyEventSlot],
) -> Result<(), sqlx::Error> {
    for slot in slots {
        sqlx::query(
            r#"
            INSERT INTO rally_event_assignments (rally_id, event_id, event_order)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(rally_id)
        .bind(slot.event_id)
        .bind(slot.event_order)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct RallyRepository {
    pool: PgPool,
}

impl RallyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads assignments for the given rallies, grouped and ordered.
    async fn load_slots(
        &self,
        rally_ids: &[Uuid],
    ) -> DomainResult<HashMap<Uuid, Vec<RallyEventSlot>>> {
        let timer = QueryTimer::new("load_rally_event_assignments");
        let result = sqlx::query_as::<_, RallyEventAssignmentEntity>(
            r#"
            SELECT rally_id, event_id, event_order
            FROM rally_event_assignments
            WHERE rally_id = ANY($1)
            ORDER BY rally_id, event_order
            "#,
        )
        .bind(rally_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let mut grouped: HashMap<Uuid, Vec<RallyEventSlot>> = HashMap::new();
        for row in result? {
            grouped.entry(row.rally_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn with_slots(&self, entity: RallyEntity) -> DomainResult<Rally> {
        let mut slots = self.load_slots(&[entity.id]).await?;
        let events = slots.remove(&entity.id).unwrap_or_default();
        entity.into_rally(events)
    }
}

#[async_trait]
impl RallyStore for RallyRepository {
    async fn create(&self, rally: NewRally) -> DomainResult<Rally> {
        let slots = slots_for(&rally.event_ids);

        let timer = QueryTimer::new("create_rally");
        let mut tx = self.pool.begin().await?;
        let entity = sqlx::query_as::<_, RallyEntity>(&format!(
            r#"
            INSERT INTO rallies (game_id, type_id, rally_date, registration_ending_date,
                                 notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RALLY_COLUMNS}
            "#
        ))
        .bind(rally.game_id)
        .bind(rally.type_id)
        .bind(rally.rally_date)
        .bind(rally.registration_ending_date)
        .bind(&rally.notes)
        .bind(rally.created_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_assignments(&mut tx, entity.id, &slots).await?;
        tx.commit().await?;
        timer.record();

        entity.into_rally(slots)
    }

    async fn find(&self, id: Uuid) -> DomainResult<Option<Rally>> {
        let timer = QueryTimer::new("find_rally");
        let result = sqlx::query_as::<_, RallyEntity>(&format!(
            "SELECT {RALLY_COLUMNS} FROM rallies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        match result? {
            Some(entity) => Ok(Some(self.with_slots(entity).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, game_id: Option<Uuid>) -> DomainResult<Vec<Rally>> {
        let timer = QueryTimer::new("list_rallies");
        let result = sqlx::query_as::<_, RallyEntity>(&format!(
            r#"
            SELECT {RALLY_COLUMNS} FROM rallies
            WHERE ($1::uuid IS NULL OR game_id = $1)
            ORDER BY rally_date, id
            "#
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        let rows = result?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut slots = self.load_slots(&ids).await?;
        rows.into_iter()
            .map(|entity| {
                let events = slots.remove(&entity.id).unwrap_or_default();
                entity.into_rally(events)
            })
            .collect()
    }

    async fn update(
        &self,
        id: Uuid,
        update: RallyUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Rally>> {
        let timer = QueryTimer::new("update_rally");
        let mut tx = self.pool.begin().await?;
        let entity = sqlx::query_as::<_, RallyEntity>(&format!(
            r#"
            UPDATE rallies
            SET rally_date = $2,
                registration_ending_date = $3,
                notes = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND rally_date > $5
            RETURNING {RALLY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.rally_date)
        .bind(update.registration_ending_date)
        .bind(&update.notes)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(entity) = entity else {
            timer.record();
            return Ok(None);
        };

        let replaced = match &update.event_ids {
            Some(event_ids) => {
                sqlx::query("DELETE FROM rally_event_assignments WHERE rally_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                let slots = slots_for(event_ids);
                insert_assignments(&mut tx, id, &slots).await?;
                Some(slots)
            }
            None => None,
        };
        tx.commit().await?;
        timer.record();

        match replaced {
            Some(slots) => entity.into_rally(slots).map(Some),
            None => self.with_slots(entity).await.map(Some),
        }
    }

    async fn cancel(
        &self,
        id: Uuid,
        cancellation: RallyCancellation,
    ) -> DomainResult<Option<Rally>> {
        let timer = QueryTimer::new("cancel_rally");
        let result = sqlx::query_as::<_, RallyEntity>(&format!(
            r#"
            UPDATE rallies
            SET status = 'cancelled',
                cancellation_reason = $2,
                cancelled_by = $3,
                cancelled_at = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND rally_date > $4
            RETURNING {RALLY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&cancellation.reason)
        .bind(cancellation.cancelled_by)
        .bind(cancellation.cancelled_at)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        match result? {
            Some(entity) => self.with_slots(entity).await.map(Some),
            None => Ok(None),
        }
    }
}
