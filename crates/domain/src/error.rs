//! Domain error taxonomy.

use thiserror::Error;

/// Errors surfaced by domain services.
///
/// Each variant carries a human-readable message that is safe to return to
/// clients, except `Database` and `Internal`, which the HTTP layer logs and
/// replaces with a generic message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::Authentication(_) => "authentication_error",
            DomainError::Authorization(_) => "authorization_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Database(_) => "database_error",
            DomainError::ExternalService(_) => "external_service_error",
            DomainError::Internal(_) => "internal_error",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        DomainError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DomainError::Conflict(message.into())
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        // unique_violation
                        "23505" => {
                            return DomainError::Conflict("Resource already exists".to_string())
                        }
                        // foreign_key_violation
                        "23503" => {
                            return DomainError::NotFound(
                                "Referenced resource not found".to_string(),
                            )
                        }
                        _ => {}
                    }
                }
                DomainError::Database(err.to_string())
            }
            _ => DomainError::Database(err.to_string()),
        }
    }
}

impl From<shared::password::PasswordError> for DomainError {
    fn from(err: shared::password::PasswordError) -> Self {
        DomainError::Internal(err.to_string())
    }
}
