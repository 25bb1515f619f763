//! Rally registration repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{NewRegistration, RallyRegistration, RegistrationDetails};
use domain::stores::RegistrationStore;
use domain::DomainResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::RallyRegistrationEntity;
use crate::metrics::QueryTimer;

const REGISTRATION_COLUMNS: &str = "id, user_id, rally_id, notes, car_setup, status, \
     cancellation_reason, cancelled_at, created_at, updated_at";

/// Confirmed, and the parent rally has not started at the instant bound to `$4`.
const STILL_CHANGEABLE: &str = "status = 'confirmed' AND EXISTS (\
     SELECT 1 FROM rallies WHERE rallies.id = rally_registrations.rally_id \
     AND rallies.rally_date > $4)";

fn to_registrations(rows: Vec<RallyRegistrationEntity>) -> DomainResult<Vec<RallyRegistration>> {
    rows.into_iter().map(RallyRegistration::try_from).collect()
}

#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationStore for RegistrationRepository {
    async fn find(&self, id: Uuid) -> DomainResult<Option<RallyRegistration>> {
        let timer = QueryTimer::new("find_registration");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM rally_registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(RallyRegistration::try_from).transpose()
    }

    async fn find_for_user_and_rally(
        &self,
        user_id: Uuid,
        rally_id: Uuid,
    ) -> DomainResult<Option<RallyRegistration>> {
        let timer = QueryTimer::new("find_registration_for_user_and_rally");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS} FROM rally_registrations
            WHERE user_id = $1 AND rally_id = $2
            "#
        ))
        .bind(user_id)
        .bind(rally_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(RallyRegistration::try_from).transpose()
    }

    async fn create(&self, registration: NewRegistration) -> DomainResult<RallyRegistration> {
        let timer = QueryTimer::new("create_registration");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            r#"
            INSERT INTO rally_registrations (user_id, rally_id, notes, car_setup)
            VALUES ($1, $2, $3, $4)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(registration.user_id)
        .bind(registration.rally_id)
        .bind(&registration.notes)
        .bind(&registration.car_setup)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        RallyRegistration::try_from(result?)
    }

    async fn update_details(
        &self,
        id: Uuid,
        details: RegistrationDetails,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<RallyRegistration>> {
        let timer = QueryTimer::new("update_registration_details");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            r#"
            UPDATE rally_registrations
            SET notes = $2, car_setup = $3, updated_at = NOW()
            WHERE id = $1 AND {STILL_CHANGEABLE}
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&details.notes)
        .bind(&details.car_setup)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(RallyRegistration::try_from).transpose()
    }

    async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<RallyRegistration>> {
        let timer = QueryTimer::new("cancel_registration");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            r#"
            UPDATE rally_registrations
            SET status = 'cancelled', cancellation_reason = $2, cancelled_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND {STILL_CHANGEABLE}
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&reason)
        .bind(at)
        .bind(at)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result?.map(RallyRegistration::try_from).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> DomainResult<Vec<RallyRegistration>> {
        let timer = QueryTimer::new("list_registrations_by_user");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS} FROM rally_registrations
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        to_registrations(result?)
    }

    async fn list_by_rally(&self, rally_id: Uuid) -> DomainResult<Vec<RallyRegistration>> {
        let timer = QueryTimer::new("list_registrations_by_rally");
        let result = sqlx::query_as::<_, RallyRegistrationEntity>(&format!(
            r#"
            SELECT {REGISTRATION_COLUMNS} FROM rally_registrations
            WHERE rally_id = $1
            ORDER BY created_at, id
            "#
        ))
        .bind(rally_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        to_registrations(result?)
    }
}
