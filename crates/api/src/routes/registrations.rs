//! Routes for the current user's rally registrations.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::{RallyRegistration, RegistrationDetails};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::ReasonRequest;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{ApprovedUser, ValidatedJson};

/// Body for registering and for updating a registration. Omitted fields
/// keep their stored value on update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistrationRequest {
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters long"))]
    pub notes: Option<String>,

    #[validate(length(max = 2000, message = "Car setup must be at most 2000 characters long"))]
    pub car_setup: Option<String>,
}

impl From<RegistrationRequest> for RegistrationDetails {
    fn from(request: RegistrationRequest) -> Self {
        RegistrationDetails {
            notes: request.notes,
            car_setup: request.car_setup,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MyRegistrationsResponse {
    pub registrations: Vec<RallyRegistration>,
}

/// GET /api/v1/registrations
pub async fn my_registrations(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
) -> Result<Json<MyRegistrationsResponse>, ApiError> {
    let registrations = state.registrations.my_registrations(user.id).await?;
    Ok(Json(MyRegistrationsResponse { registrations }))
}

/// PUT /api/v1/registrations/:id
pub async fn update_registration(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    Path(registration_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RegistrationRequest>,
) -> Result<Json<RallyRegistration>, ApiError> {
    let registration = state
        .registrations
        .update_registration(registration_id, user.id, request.into())
        .await?;
    Ok(Json(registration))
}

/// POST /api/v1/registrations/:id/cancel
pub async fn cancel_registration(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    Path(registration_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReasonRequest>,
) -> Result<Json<RallyRegistration>, ApiError> {
    let registration = state
        .registrations
        .cancel_registration(registration_id, user.id, request.reason)
        .await?;
    Ok(Json(registration))
}
