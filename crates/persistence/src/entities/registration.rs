//! Rally registration entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::RallyRegistration;
use domain::DomainError;
use sqlx::FromRow;
use uuid::Uuid;

use super::parse_column;

#[derive(Debug, Clone, FromRow)]
pub struct RallyRegistrationEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub rally_id: Uuid,
    pub notes: Option<String>,
    pub car_setup: Option<String>,
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RallyRegistrationEntity> for RallyRegistration {
    type Error = DomainError;

    fn try_from(entity: RallyRegistrationEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            user_id: entity.user_id,
            rally_id: entity.rally_id,
            notes: entity.notes,
            car_setup: entity.car_setup,
            status: parse_column(&entity.status)?,
            cancellation_reason: entity.cancellation_reason,
            cancelled_at: entity.cancelled_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
