//! Email delivery log repository.

use async_trait::async_trait;
use domain::models::{EmailLog, NewEmailLog};
use domain::stores::EmailLogStore;
use domain::DomainResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::EmailLogEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct EmailLogRepository {
    pool: PgPool,
}

impl EmailLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailLogStore for EmailLogRepository {
    async fn record(&self, entry: NewEmailLog) -> DomainResult<EmailLog> {
        let timer = QueryTimer::new("insert_email_log");
        let result = sqlx::query_as::<_, EmailLogEntity>(
            r#"
            INSERT INTO email_logs (user_id, email_type, recipient, status, error_message, attempts)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, email_type, recipient, status, error_message, attempts, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.email_type.as_str())
        .bind(&entry.recipient)
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(entry.attempts)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        EmailLog::try_from(result?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<EmailLog>> {
        let timer = QueryTimer::new("list_email_logs");
        let result = sqlx::query_as::<_, EmailLogEntity>(
            r#"
            SELECT id, user_id, email_type, recipient, status, error_message, attempts, created_at
            FROM email_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result?.into_iter().map(EmailLog::try_from).collect()
    }
}
