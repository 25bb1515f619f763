//! Bearer token extractors.
//!
//! - [`AuthUser`]: any valid token whose user still exists
//! - [`ApprovedUser`]: additionally passes the account access rule
//! - [`AdminUser`]: an approved principal with the admin role
//!
//! The access rule is re-checked on every request, so a user rejected
//! after logging in loses access immediately.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use domain::models::User;
use domain::DomainError;
use shared::jwt::{AuthClaims, JwtError};

use crate::app::AppState;
use crate::error::ApiError;

const MSG_INVALID_TOKEN: &str = "Invalid or expired token";

async fn bearer_claims(parts: &mut Parts, state: &AppState) -> Result<AuthClaims, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
            })?;

    state.tokens.verify(bearer.token()).map_err(|e| {
        if !matches!(e, JwtError::TokenExpired | JwtError::InvalidToken) {
            tracing::debug!(error = %e, "Token verification failed");
        }
        ApiError::Unauthorized(MSG_INVALID_TOKEN.to_string())
    })
}

/// Principal behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state).await?;
        let user = state.users.get_user(claims.user_id).await.map_err(|e| match e {
            DomainError::NotFound(_) => ApiError::Unauthorized(MSG_INVALID_TOKEN.to_string()),
            other => other.into(),
        })?;
        Ok(AuthUser(user))
    }
}

/// Principal allowed to use the rally features.
#[derive(Debug, Clone)]
pub struct ApprovedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for ApprovedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state).await?;
        let user = state.users.authorize(claims.user_id).await?;
        Ok(ApprovedUser(user))
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ApprovedUser(user) = ApprovedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
