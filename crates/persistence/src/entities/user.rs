//! User account entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{User, UserStats};
use domain::DomainError;
use sqlx::FromRow;
use uuid::Uuid;

use super::parse_column;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub email_verified: bool,
    pub admin_approved: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserEntity> for User {
    type Error = DomainError;

    fn try_from(entity: UserEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            email: entity.email,
            password_hash: entity.password_hash,
            name: entity.name,
            role: parse_column(&entity.role)?,
            status: parse_column(&entity.status)?,
            email_verified: entity.email_verified,
            admin_approved: entity.admin_approved,
            verification_token_hash: entity.verification_token_hash,
            verification_expires_at: entity.verification_expires_at,
            last_login_at: entity.last_login_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Aggregate row for the user stats query.
#[derive(Debug, Clone, FromRow)]
pub struct UserStatsEntity {
    pub total: i64,
    pub pending_email: i64,
    pub pending_approval: i64,
    pub approved: i64,
    pub rejected: i64,
    pub admins: i64,
}

impl From<UserStatsEntity> for UserStats {
    fn from(entity: UserStatsEntity) -> Self {
        Self {
            total: entity.total,
            pending_email: entity.pending_email,
            pending_approval: entity.pending_approval,
            approved: entity.approved,
            rejected: entity.rejected,
            admins: entity.admins,
        }
    }
}
