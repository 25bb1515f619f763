//! Shared utilities and common types for the rally registration backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, secure token generation)
//! - Password hashing with Argon2id
//! - Bearer token issuing and verification
//! - Common validation logic
//! - Offset pagination helpers

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod password;
pub mod validation;
