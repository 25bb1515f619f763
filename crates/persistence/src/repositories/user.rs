//! User repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{AdminAction, NewAdminAction, NewUser, User, UserStats, UserStatus};
use domain::stores::UserStore;
use domain::{DomainError, DomainResult};
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{AdminActionEntity, UserEntity, UserStatsEntity};
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, email, password_hash, name, role, status, email_verified, \
     admin_approved, verification_token_hash, verification_expires_at, last_login_at, \
     created_at, updated_at";

/// Repository for user accounts and the admin decisions made on them.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_users(rows: Vec<UserEntity>) -> DomainResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(User::try_from).transpose()
    }

    async fn create(&self, user: NewUser) -> DomainResult<User> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name, role, status, email_verified,
                               admin_approved, verification_token_hash, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.email_verified)
        .bind(user.admin_approved)
        .bind(&user.verification_token_hash)
        .bind(user.verification_expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        User::try_from(result?)
    }

    async fn find_by_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<User>> {
        let timer = QueryTimer::new("find_user_by_verification_token");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE verification_token_hash = $1 AND verification_expires_at > $2
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(User::try_from).transpose()
    }

    async fn complete_email_verification(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> DomainResult<Option<User>> {
        let timer = QueryTimer::new("complete_email_verification");
        // Mirrors User::reconciled_status with email_verified = true.
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET email_verified = true,
                status = CASE
                    WHEN status = 'rejected' THEN 'rejected'
                    WHEN admin_approved THEN 'approved'
                    ELSE 'pending_approval'
                END,
                verification_token_hash = NULL,
                verification_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND verification_token_hash = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(User::try_from).transpose()
    }

    async fn apply_admin_decision(
        &self,
        user_id: Uuid,
        expected: UserStatus,
        admin_approved: bool,
        status: UserStatus,
        action: NewAdminAction,
    ) -> DomainResult<Option<User>> {
        let timer = QueryTimer::new("apply_admin_decision");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET admin_approved = $2, status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(admin_approved)
        .bind(status.as_str())
        .bind(expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await?;
            timer.record();
            return if exists {
                tracing::debug!(
                    user_id = %user_id,
                    expected = %expected,
                    "User status moved before decision"
                );
                Ok(None)
            } else {
                Err(DomainError::not_found("User not found"))
            };
        };

        sqlx::query(
            r#"
            INSERT INTO admin_actions (admin_id, target_user_id, action, reason, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(action.admin_id)
        .bind(action.target_user_id)
        .bind(action.action.as_str())
        .bind(&action.reason)
        .bind(&action.metadata)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        User::try_from(updated).map(Some)
    }

    async fn replace_verification_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let timer = QueryTimer::new("replace_verification_token");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_token_hash = $2, verification_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result?;
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        let timer = QueryTimer::new("record_user_login");
        let result = sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await;
        timer.record();
        result?;
        Ok(())
    }

    async fn list(
        &self,
        status: Option<UserStatus>,
        page: PageRequest,
    ) -> DomainResult<(Vec<User>, i64)> {
        let status = status.map(|s| s.as_str());

        let timer = QueryTimer::new("list_users");
        let rows = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let timer = QueryTimer::new("count_users");
        let total: Result<i64, sqlx::Error> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok((to_users(rows?)?, total?))
    }

    async fn stats(&self) -> DomainResult<UserStats> {
        let timer = QueryTimer::new("user_stats");
        let result = sqlx::query_as::<_, UserStatsEntity>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'pending_email') AS pending_email,
                   COUNT(*) FILTER (WHERE status = 'pending_approval') AS pending_approval,
                   COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                   COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
                   COUNT(*) FILTER (WHERE role = 'admin') AS admins
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await;
        timer.record();
        Ok(result?.into())
    }

    async fn admin_actions_for(&self, target_user_id: Uuid) -> DomainResult<Vec<AdminAction>> {
        let timer = QueryTimer::new("list_admin_actions");
        let result = sqlx::query_as::<_, AdminActionEntity>(
            r#"
            SELECT id, admin_id, target_user_id, action, reason, metadata, created_at
            FROM admin_actions
            WHERE target_user_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(target_user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result?.into_iter().map(AdminAction::try_from).collect()
    }
}
