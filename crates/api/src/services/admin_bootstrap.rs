//! Admin bootstrap for initial setup.
//!
//! Creates the first admin account on startup when `admin.bootstrap_email`
//! and `admin.bootstrap_password` are configured. Safe to run on every boot.

use domain::services::UserLifecycleService;
use domain::DomainError;
use tracing::{info, warn};

use crate::config::AdminBootstrapConfig;

/// Bootstrap the admin account if configured and not already present.
///
/// This function should be called after migrations on startup.
pub async fn bootstrap_admin(
    users: &UserLifecycleService,
    config: &AdminBootstrapConfig,
) -> Result<(), DomainError> {
    if config.bootstrap_email.is_empty() {
        return Ok(());
    }

    if config.bootstrap_password.is_empty() {
        warn!(
            "RALLY__ADMIN__BOOTSTRAP_EMAIL is set but RALLY__ADMIN__BOOTSTRAP_PASSWORD is empty - skipping bootstrap"
        );
        return Ok(());
    }

    match users
        .bootstrap_admin(
            &config.bootstrap_email,
            &config.bootstrap_password,
            &config.bootstrap_name,
        )
        .await?
    {
        Some(admin) => info!(
            user_id = %admin.id,
            email = %admin.email,
            "Bootstrap admin account created"
        ),
        None => info!("Bootstrap email already registered - skipping bootstrap"),
    }
    Ok(())
}
