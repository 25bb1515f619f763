//! Repository implementations for database operations.
//!
//! Each repository owns a [`sqlx::PgPool`] and implements one of the
//! store traits from `domain::stores`.

pub mod catalog;
pub mod email_log;
pub mod rally;
pub mod registration;
pub mod user;

pub use catalog::CatalogRepository;
pub use email_log::EmailLogRepository;
pub use rally::RallyRepository;
pub use registration::RegistrationRepository;
pub use user::UserRepository;
