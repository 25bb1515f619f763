//! Rally entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{Rally, RallyEventSlot};
use domain::DomainError;
use sqlx::FromRow;
use uuid::Uuid;

use super::parse_column;

/// Row of the rallies table, without its events.
#[derive(Debug, Clone, FromRow)]
pub struct RallyEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub type_id: Uuid,
    pub rally_date: DateTime<Utc>,
    pub registration_ending_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the rally_event_assignments table.
#[derive(Debug, Clone, FromRow)]
pub struct RallyEventAssignmentEntity {
    pub rally_id: Uuid,
    pub event_id: Uuid,
    pub event_order: i32,
}

impl From<RallyEventAssignmentEntity> for RallyEventSlot {
    fn from(entity: RallyEventAssignmentEntity) -> Self {
        Self {
            event_id: entity.event_id,
            event_order: entity.event_order,
        }
    }
}

impl RallyEntity {
    /// Builds the domain rally from this row and its assignments, which
    /// must already be sorted by `event_order`.
    pub fn into_rally(self, events: Vec<RallyEventSlot>) -> Result<Rally, DomainError> {
        Ok(Rally {
            id: self.id,
            game_id: self.game_id,
            type_id: self.type_id,
            rally_date: self.rally_date,
            registration_ending_date: self.registration_ending_date,
            notes: self.notes,
            status: parse_column(&self.status)?,
            cancellation_reason: self.cancellation_reason,
            cancelled_by: self.cancelled_by,
            cancelled_at: self.cancelled_at,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            events,
        })
    }
}
