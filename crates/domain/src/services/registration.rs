//! Registration manager: links users to rallies, at most once per pair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{NewRegistration, RallyRegistration, RegistrationDetails};
use crate::services::clock::Clock;
use crate::stores::{RallyStore, RegistrationStore};

pub const MSG_REGISTRATION_CLOSED: &str = "Rally not found or registration closed";
pub const MSG_ALREADY_REGISTERED: &str = "Already registered for this rally";
pub const MSG_REGISTRATION_NOT_FOUND: &str = "Registration not found";
pub const MSG_MODIFY_PAST: &str = "Cannot modify registrations for past rallies";
pub const MSG_CANCEL_PAST: &str = "Cannot cancel registrations for past rallies";
pub const MSG_ALREADY_CANCELLED: &str = "Registration is already cancelled";
pub const MSG_MODIFY_CANCELLED: &str = "Cannot modify a cancelled registration";

#[derive(Clone)]
pub struct RegistrationService {
    rallies: Arc<dyn RallyStore>,
    registrations: Arc<dyn RegistrationStore>,
    clock: Arc<dyn Clock>,
}

impl RegistrationService {
    pub fn new(
        rallies: Arc<dyn RallyStore>,
        registrations: Arc<dyn RegistrationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rallies,
            registrations,
            clock,
        }
    }

    /// Registers a user while the rally's registration window is open.
    ///
    /// Any earlier row for the pair, cancelled or not, blocks a new one.
    pub async fn register(
        &self,
        user_id: Uuid,
        rally_id: Uuid,
        details: RegistrationDetails,
    ) -> DomainResult<RallyRegistration> {
        let now = self.clock.now();
        match self.rallies.find(rally_id).await? {
            Some(rally) if rally.accepts_registrations(now) => {}
            _ => return Err(DomainError::validation(MSG_REGISTRATION_CLOSED)),
        }

        if self
            .registrations
            .find_for_user_and_rally(user_id, rally_id)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict(MSG_ALREADY_REGISTERED));
        }

        let registration = self
            .registrations
            .create(NewRegistration {
                user_id,
                rally_id,
                notes: details.notes,
                car_setup: details.car_setup,
            })
            .await
            .map_err(|e| match e {
                DomainError::Conflict(_) => DomainError::conflict(MSG_ALREADY_REGISTERED),
                other => other,
            })?;

        tracing::info!(
            registration_id = %registration.id,
            user_id = %user_id,
            rally_id = %rally_id,
            "Registered for rally"
        );
        Ok(registration)
    }

    /// Loads a registration owned by `user_id` that may still change at `now`.
    ///
    /// A past rally takes precedence over an already cancelled registration.
    async fn changeable(
        &self,
        registration_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
        past: &str,
        cancelled: &str,
    ) -> DomainResult<RallyRegistration> {
        let registration = self
            .registrations
            .find(registration_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| DomainError::not_found(MSG_REGISTRATION_NOT_FOUND))?;

        let rally = self
            .rallies
            .find(registration.rally_id)
            .await?
            .ok_or_else(|| DomainError::not_found(MSG_REGISTRATION_NOT_FOUND))?;

        if rally.is_past(now) {
            return Err(DomainError::validation(past));
        }
        if registration.is_cancelled() {
            return Err(DomainError::validation(cancelled));
        }
        Ok(registration)
    }

    /// Explains a guarded write that matched no row.
    async fn stale_write(
        &self,
        registration_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
        past: &str,
        cancelled: &str,
    ) -> DomainError {
        match self
            .changeable(registration_id, user_id, now, past, cancelled)
            .await
        {
            Ok(_) => DomainError::conflict("Registration changed concurrently"),
            Err(err) => err,
        }
    }

    /// Replaces the supplied detail fields.
    pub async fn update_registration(
        &self,
        registration_id: Uuid,
        user_id: Uuid,
        details: RegistrationDetails,
    ) -> DomainResult<RallyRegistration> {
        let now = self.clock.now();
        let registration = self
            .changeable(
                registration_id,
                user_id,
                now,
                MSG_MODIFY_PAST,
                MSG_MODIFY_CANCELLED,
            )
            .await?;

        let merged = RegistrationDetails {
            notes: details.notes.or(registration.notes),
            car_setup: details.car_setup.or(registration.car_setup),
        };
        let Some(updated) = self
            .registrations
            .update_details(registration.id, merged, now)
            .await?
        else {
            return Err(self
                .stale_write(
                    registration_id,
                    user_id,
                    now,
                    MSG_MODIFY_PAST,
                    MSG_MODIFY_CANCELLED,
                )
                .await);
        };

        tracing::info!(registration_id = %updated.id, user_id = %user_id, "Registration updated");
        Ok(updated)
    }

    pub async fn cancel_registration(
        &self,
        registration_id: Uuid,
        user_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<RallyRegistration> {
        let now = self.clock.now();
        self.changeable(
            registration_id,
            user_id,
            now,
            MSG_CANCEL_PAST,
            MSG_ALREADY_CANCELLED,
        )
        .await?;

        let Some(cancelled) = self
            .registrations
            .cancel(registration_id, reason, now)
            .await?
        else {
            return Err(self
                .stale_write(
                    registration_id,
                    user_id,
                    now,
                    MSG_CANCEL_PAST,
                    MSG_ALREADY_CANCELLED,
                )
                .await);
        };

        tracing::info!(
            registration_id = %cancelled.id,
            user_id = %user_id,
            "Registration cancelled"
        );
        Ok(cancelled)
    }

    pub async fn my_registrations(&self, user_id: Uuid) -> DomainResult<Vec<RallyRegistration>> {
        self.registrations.list_by_user(user_id).await
    }

    pub async fn rally_registrations(
        &self,
        rally_id: Uuid,
    ) -> DomainResult<Vec<RallyRegistration>> {
        if self.rallies.find(rally_id).await?.is_none() {
            return Err(DomainError::not_found("Rally not found"));
        }
        self.registrations.list_by_rally(rally_id).await
    }
}
