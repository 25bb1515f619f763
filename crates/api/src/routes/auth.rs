//! Authentication routes: signup, email verification and login.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use domain::models::User;
use domain::services::Registration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AuthUser, ValidatedJson};
use crate::middleware::metrics::record_user_registered;

const MSG_INVALID_VERIFICATION_TOKEN: &str = "Invalid or expired verification token";

/// Request body for user registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength rules are enforced by the lifecycle service.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// User information in responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub email_verified: bool,
    pub admin_approved: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role.as_str().to_string(),
            status: user.status.as_str().to_string(),
            email_verified: user.email_verified,
            admin_approved: user.admin_approved,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub email_sent: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Register a new account.
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let registered = state
        .users
        .register(Registration {
            email: request.email,
            password: request.password,
            name: request.name,
        })
        .await?;

    record_user_registered(registered.email_sent);

    let message = if registered.email_sent {
        "Registration successful. Please check your email to verify your account."
    } else {
        "Registration successful, but the verification email could not be sent. Please request a new one."
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: registered.user.into(),
            email_sent: registered.email_sent,
            message: message.to_string(),
        }),
    ))
}

/// Consume an email verification token.
///
/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.users.verify_email(&request.token).await? {
        return Err(ApiError::Validation(
            MSG_INVALID_VERIFICATION_TOKEN.to_string(),
        ));
    }
    Ok(Json(MessageResponse {
        message: "Email verified. Your account is awaiting admin approval.".to_string(),
    }))
}

/// Re-send the verification email.
///
/// POST /api/v1/auth/resend-verification
///
/// Always answers 202 so the response does not reveal whether the address
/// is registered.
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResendVerificationRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    state.users.resend_verification(&request.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If the account is awaiting verification, a new email has been sent."
                .to_string(),
        }),
    ))
}

/// Log in with email and password.
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .users
        .authenticate(&request.email, &request.password)
        .await?;

    let token = state
        .tokens
        .issue(user.id, user.role.as_str())
        .map_err(|e| ApiError::Internal(format!("Token error: {}", e)))?;

    Ok(Json(LoginResponse {
        access_token: token.token,
        token_type: "Bearer".to_string(),
        expires_in: token.expires_in,
        user: user.into(),
    }))
}

/// Current principal, whatever its approval state.
///
/// GET /api/v1/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}
