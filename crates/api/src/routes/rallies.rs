//! Rally routes. Every rally in a response carries its derived
//! `displayStatus`, computed against the server clock at response time.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::{DisplayStatus, Rally, RallyRegistration, RegistrationDetails};
use domain::services::{CreateRally, RallyChanges, RallyFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::registrations::RegistrationRequest;
use super::ReasonRequest;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, ApprovedUser, ValidatedJson};
use crate::middleware::metrics::record_rally_registration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRalliesQuery {
    pub status: Option<String>,
    pub game_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRallyRequest {
    pub game_id: Uuid,
    pub type_id: Uuid,
    #[validate(length(min = 1, message = "At least one event is required"))]
    pub event_ids: Vec<Uuid>,
    pub rally_date: DateTime<Utc>,
    pub registration_ending_date: DateTime<Utc>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters long"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRallyRequest {
    pub rally_date: Option<DateTime<Utc>>,
    pub registration_ending_date: Option<DateTime<Utc>>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters long"))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one event is required"))]
    pub event_ids: Option<Vec<Uuid>>,
}

/// A rally with its derived display status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyResponse {
    #[serde(flatten)]
    pub rally: Rally,
    pub display_status: DisplayStatus,
}

impl RallyResponse {
    pub fn new(rally: Rally, now: DateTime<Utc>) -> Self {
        let display_status = rally.display_status(now);
        Self {
            rally,
            display_status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RalliesResponse {
    pub rallies: Vec<RallyResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RallyRegistrationsResponse {
    pub registrations: Vec<RallyRegistration>,
}

/// GET /api/v1/rallies
pub async fn list_rallies(
    State(state): State<AppState>,
    ApprovedUser(_user): ApprovedUser,
    Query(query): Query<ListRalliesQuery>,
) -> Result<Json<RalliesResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<DisplayStatus>().map_err(ApiError::Validation))
        .transpose()?;

    let rallies = state
        .rallies
        .list_rallies(RallyFilter {
            status,
            game_id: query.game_id,
        })
        .await?;

    let now = state.clock.now();
    Ok(Json(RalliesResponse {
        rallies: rallies
            .into_iter()
            .map(|r| RallyResponse::new(r, now))
            .collect(),
    }))
}

/// POST /api/v1/rallies
pub async fn create_rally(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(request): ValidatedJson<CreateRallyRequest>,
) -> Result<(StatusCode, Json<RallyResponse>), ApiError> {
    let rally = state
        .rallies
        .create_rally(
            CreateRally {
                game_id: request.game_id,
                type_id: request.type_id,
                event_ids: request.event_ids,
                rally_date: request.rally_date,
                registration_ending_date: request.registration_ending_date,
                notes: request.notes,
            },
            admin.id,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RallyResponse::new(rally, state.clock.now())),
    ))
}

/// GET /api/v1/rallies/:id
pub async fn get_rally(
    State(state): State<AppState>,
    ApprovedUser(_user): ApprovedUser,
    Path(rally_id): Path<Uuid>,
) -> Result<Json<RallyResponse>, ApiError> {
    let rally = state.rallies.get_rally(rally_id).await?;
    Ok(Json(RallyResponse::new(rally, state.clock.now())))
}

/// PUT /api/v1/rallies/:id
pub async fn update_rally(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(rally_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateRallyRequest>,
) -> Result<Json<RallyResponse>, ApiError> {
    let rally = state
        .rallies
        .update_rally(
            rally_id,
            RallyChanges {
                rally_date: request.rally_date,
                registration_ending_date: request.registration_ending_date,
                notes: request.notes,
                event_ids: request.event_ids,
            },
        )
        .await?;
    Ok(Json(RallyResponse::new(rally, state.clock.now())))
}

/// POST /api/v1/rallies/:id/cancel
pub async fn cancel_rally(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(rally_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReasonRequest>,
) -> Result<Json<RallyResponse>, ApiError> {
    let rally = state
        .rallies
        .cancel_rally(rally_id, admin.id, request.reason)
        .await?;
    Ok(Json(RallyResponse::new(rally, state.clock.now())))
}

/// GET /api/v1/rallies/:id/registrations
pub async fn list_rally_registrations(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(rally_id): Path<Uuid>,
) -> Result<Json<RallyRegistrationsResponse>, ApiError> {
    let registrations = state.registrations.rally_registrations(rally_id).await?;
    Ok(Json(RallyRegistrationsResponse { registrations }))
}

/// POST /api/v1/rallies/:id/registrations
pub async fn register_for_rally(
    State(state): State<AppState>,
    ApprovedUser(user): ApprovedUser,
    Path(rally_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RegistrationRequest>,
) -> Result<(StatusCode, Json<RallyRegistration>), ApiError> {
    let registration = state
        .registrations
        .register(user.id, rally_id, RegistrationDetails::from(request))
        .await?;
    record_rally_registration();
    Ok((StatusCode::CREATED, Json(registration)))
}
