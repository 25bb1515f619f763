//! Catalog routes for rally games, types and events.
//!
//! Approved users can browse the active catalog; admins manage it and may
//! list inactive entries with `?includeInactive=true`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{CatalogEntryChanges, NewCatalogEntry, RallyEvent, RallyGame, RallyType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, ApprovedUser, ValidatedJson};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogListQuery {
    pub include_inactive: Option<bool>,
}

impl CatalogListQuery {
    fn active_only(&self, principal: &ApprovedUser) -> bool {
        !(principal.0.is_admin() && self.include_inactive.unwrap_or(false))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCatalogEntryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters long"))]
    pub description: Option<String>,
}

impl From<CreateCatalogEntryRequest> for NewCatalogEntry {
    fn from(request: CreateCatalogEntryRequest) -> Self {
        NewCatalogEntry {
            name: request.name,
            description: request.description,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCatalogEntryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters long"))]
    pub description: Option<String>,

    pub is_active: Option<bool>,
}

impl From<UpdateCatalogEntryRequest> for CatalogEntryChanges {
    fn from(request: UpdateCatalogEntryRequest) -> Self {
        CatalogEntryChanges {
            name: request.name,
            description: request.description,
            is_active: request.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GamesResponse {
    pub games: Vec<RallyGame>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypesResponse {
    pub types: Vec<RallyType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<RallyEvent>,
}

/// GET /api/v1/games
pub async fn list_games(
    State(state): State<AppState>,
    principal: ApprovedUser,
    Query(query): Query<CatalogListQuery>,
) -> Result<Json<GamesResponse>, ApiError> {
    let games = state
        .catalog
        .list_games(query.active_only(&principal))
        .await?;
    Ok(Json(GamesResponse { games }))
}

/// POST /api/v1/games
pub async fn create_game(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidatedJson(request): ValidatedJson<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<RallyGame>), ApiError> {
    let game = state.catalog.create_game(request.into()).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// GET /api/v1/games/:id
pub async fn get_game(
    State(state): State<AppState>,
    ApprovedUser(_user): ApprovedUser,
    Path(game_id): Path<Uuid>,
) -> Result<Json<RallyGame>, ApiError> {
    Ok(Json(state.catalog.get_game(game_id).await?))
}

/// PUT /api/v1/games/:id
pub async fn update_game(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(game_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCatalogEntryRequest>,
) -> Result<Json<RallyGame>, ApiError> {
    Ok(Json(state.catalog.update_game(game_id, request.into()).await?))
}

/// DELETE /api/v1/games/:id
pub async fn delete_game(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(game_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_game(game_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/games/:id/types
pub async fn list_types(
    State(state): State<AppState>,
    principal: ApprovedUser,
    Path(game_id): Path<Uuid>,
    Query(query): Query<CatalogListQuery>,
) -> Result<Json<TypesResponse>, ApiError> {
    let types = state
        .catalog
        .list_types(game_id, query.active_only(&principal))
        .await?;
    Ok(Json(TypesResponse { types }))
}

/// POST /api/v1/games/:id/types
pub async fn create_type(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(game_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<RallyType>), ApiError> {
    let rally_type = state.catalog.create_type(game_id, request.into()).await?;
    Ok((StatusCode::CREATED, Json(rally_type)))
}

/// PUT /api/v1/types/:id
pub async fn update_type(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(type_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCatalogEntryRequest>,
) -> Result<Json<RallyType>, ApiError> {
    Ok(Json(state.catalog.update_type(type_id, request.into()).await?))
}

/// DELETE /api/v1/types/:id
pub async fn delete_type(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(type_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_type(type_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/games/:id/events
pub async fn list_events(
    State(state): State<AppState>,
    principal: ApprovedUser,
    Path(game_id): Path<Uuid>,
    Query(query): Query<CatalogListQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let events = state
        .catalog
        .list_events(game_id, query.active_only(&principal))
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// POST /api/v1/games/:id/events
pub async fn create_event(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(game_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<RallyEvent>), ApiError> {
    let event = state.catalog.create_event(game_id, request.into()).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /api/v1/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(event_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCatalogEntryRequest>,
) -> Result<Json<RallyEvent>, ApiError> {
    Ok(Json(state.catalog.update_event(event_id, request.into()).await?))
}

/// DELETE /api/v1/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
