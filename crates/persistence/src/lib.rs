//! Persistence layer for the rally registration backend.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;

pub use db::{create_pool, run_migrations, DatabaseConfig, DatabaseHealth};
pub use repositories::{
    CatalogRepository, EmailLogRepository, RallyRepository, RegistrationRepository,
    UserRepository,
};
