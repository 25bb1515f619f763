//! Common validation utilities.
//!
//! These functions follow the `validator` custom-function signature so they
//! can be used both from `#[validate(custom(function = ...))]` attributes on
//! request structs and directly from service code.

use validator::{ValidateEmail, ValidationError};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input bound).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length of a display name.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

/// Maximum length of a catalog entry name (games, types, events).
pub const MAX_CATALOG_NAME_LENGTH: usize = 100;

/// Maximum length of an email address.
pub const MAX_EMAIL_LENGTH: usize = 255;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates password strength: at least 8 characters with an uppercase
/// letter, a lowercase letter and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(error(
            "password_length",
            "Password must be at least 8 characters long",
        ));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(error(
            "password_length",
            "Password must be at most 128 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(error(
            "password_uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(error(
            "password_lowercase",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(error(
            "password_digit",
            "Password must contain at least one digit",
        ));
    }
    Ok(())
}

/// Validates a display name: non-blank after trimming, at most 100 characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(error("name_required", "Name is required"));
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(error(
            "name_length",
            "Name must be at most 100 characters long",
        ));
    }
    Ok(())
}

/// Validates a catalog entry name: non-blank, at most 100 characters.
pub fn validate_catalog_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(error("name_required", "Name is required"));
    }
    if trimmed.chars().count() > MAX_CATALOG_NAME_LENGTH {
        return Err(error(
            "name_length",
            "Name must be at most 100 characters long",
        ));
    }
    Ok(())
}

/// Validates the shape of an email address.
pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    let trimmed = email.trim();
    if trimmed.len() > MAX_EMAIL_LENGTH || !trimmed.to_string().validate_email() {
        return Err(error("email_invalid", "Invalid email format"));
    }
    Ok(())
}

/// Canonical form of an email address: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
