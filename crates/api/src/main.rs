use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use domain::services::SystemClock;
use tracing::info;

use rally_api::app::{create_app, AppState, Stores};
use rally_api::config::Config;
use rally_api::middleware;
use rally_api::services::{bootstrap_admin, EmailService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    config.validate()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting rally registration API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::create_pool(&persistence::DatabaseConfig::from(&config.database))
        .await
        .context("failed to connect to database")?;

    info!("Running database migrations...");
    persistence::run_migrations(&pool).await?;
    info!("Migrations completed");

    let tokens = config.jwt.build()?;
    info!(algorithm = ?tokens.algorithm(), "Token service configured");

    let email = EmailService::new(config.email.clone())?;
    info!(
        enabled = email.is_enabled(),
        provider = %config.email.provider,
        "Email service configured"
    );

    let addr = config.socket_addr()?;
    let bootstrap = config.admin.clone();

    let state = AppState::new(
        config,
        Stores::postgres(pool),
        Arc::new(email),
        Arc::new(tokens),
        Arc::new(SystemClock),
    );

    bootstrap_admin(&state.users, &bootstrap).await?;

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
