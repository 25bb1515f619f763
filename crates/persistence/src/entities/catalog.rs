//! Catalog entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{RallyEvent, RallyGame, RallyType};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of the rally_games table.
#[derive(Debug, Clone, FromRow)]
pub struct GameEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GameEntity> for RallyGame {
    fn from(entity: GameEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Row of rally_types or rally_events; both tables share this shape.
#[derive(Debug, Clone, FromRow)]
pub struct GameScopedEntity {
    pub id: Uuid,
    pub game_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GameScopedEntity> for RallyType {
    fn from(entity: GameScopedEntity) -> Self {
        Self {
            id: entity.id,
            game_id: entity.game_id,
            name: entity.name,
            description: entity.description,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

impl From<GameScopedEntity> for RallyEvent {
    fn from(entity: GameScopedEntity) -> Self {
        Self {
            id: entity.id,
            game_id: entity.game_id,
            name: entity.name,
            description: entity.description,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
