//! Admin user management: review queue, approval decisions and audit trails.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::{AdminAction, EmailLog, UserStats, UserStatus};
use serde::{Deserialize, Serialize};
use shared::pagination::{PageInfo, PageRequest};
use uuid::Uuid;

use super::auth::UserResponse;
use super::ReasonRequest;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, ValidatedJson};
use crate::middleware::metrics::record_admin_decision;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminActionsResponse {
    pub actions: Vec<AdminAction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLogsResponse {
    pub emails: Vec<EmailLog>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<UserStatus>, ApiError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| s.parse::<UserStatus>().map_err(ApiError::Validation))
        .transpose()
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let status = parse_status(query.status.as_deref())?;
    let page = PageRequest::new(query.page, query.per_page);

    let (users, pagination) = state.users.list_users(status, page).await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        pagination,
    }))
}

/// GET /api/v1/admin/users/stats
pub async fn user_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(state.users.stats().await?))
}

/// GET /api/v1/admin/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(state.users.get_user(user_id).await?.into()))
}

/// POST /api/v1/admin/users/:id/approve
pub async fn approve_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReasonRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .users
        .approve_user(user_id, admin.id, request.reason)
        .await?;
    record_admin_decision("approve");
    Ok(Json(user.into()))
}

/// POST /api/v1/admin/users/:id/reject
pub async fn reject_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReasonRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .users
        .reject_user(user_id, admin.id, request.reason)
        .await?;
    record_admin_decision("reject");
    Ok(Json(user.into()))
}

/// GET /api/v1/admin/users/:id/actions
pub async fn admin_actions(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AdminActionsResponse>, ApiError> {
    let actions = state.users.admin_actions(user_id).await?;
    Ok(Json(AdminActionsResponse { actions }))
}

/// GET /api/v1/admin/users/:id/emails
pub async fn email_logs(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<EmailLogsResponse>, ApiError> {
    let emails = state.users.email_logs(user_id).await?;
    Ok(Json(EmailLogsResponse { emails }))
}
