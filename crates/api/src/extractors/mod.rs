//! Request extractors.

pub mod auth;
pub mod validated;

pub use auth::{AdminUser, ApprovedUser, AuthUser};
pub use validated::ValidatedJson;
