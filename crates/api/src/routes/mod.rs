//! HTTP route handlers.

pub mod admin_users;
pub mod auth;
pub mod catalog;
pub mod health;
pub mod rallies;
pub mod registrations;

use serde::Deserialize;

/// Optional free-text reason carried by approve, reject and cancel actions.
#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReasonRequest {
    #[validate(length(max = 1000, message = "Reason must be at most 1000 characters long"))]
    pub reason: Option<String>,
}
