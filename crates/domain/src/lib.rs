//! Domain layer for the rally registration backend.
//!
//! This crate contains:
//! - Domain models (users, catalog, rallies, registrations, audit logs)
//! - Status derivation for users and rallies
//! - Store, notifier and clock traits implemented by outer layers
//! - Lifecycle services holding the business rules
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod stores;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{DomainError, DomainResult};
