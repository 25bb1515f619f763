use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono::Duration as ChronoDuration;
use domain::services::{
    CatalogService, Clock, NotificationDispatcher, Notifier, RallyLifecycleService,
    RegistrationService, RetryPolicy, UserLifecycleService, UserLifecycleSettings,
};
use domain::stores::{
    CatalogStore, EmailLogStore, HealthProbe, RallyStore, RegistrationStore, UserStore,
};
use persistence::{
    CatalogRepository, DatabaseHealth, EmailLogRepository, RallyRepository,
    RegistrationRepository, UserRepository,
};
use shared::jwt::TokenService;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    auth_rate_limit_middleware, metrics_handler, metrics_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{admin_users, auth, catalog, health, rallies, registrations};

/// Storage backends behind the domain traits.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub email_logs: Arc<dyn EmailLogStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub rallies: Arc<dyn RallyStore>,
    pub registrations: Arc<dyn RegistrationStore>,
    pub health: Arc<dyn HealthProbe>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            email_logs: Arc::new(EmailLogRepository::new(pool.clone())),
            catalog: Arc::new(CatalogRepository::new(pool.clone())),
            rallies: Arc::new(RallyRepository::new(pool.clone())),
            registrations: Arc::new(RegistrationRepository::new(pool.clone())),
            health: Arc::new(DatabaseHealth::new(pool)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: UserLifecycleService,
    pub rallies: RallyLifecycleService,
    pub registrations: RegistrationService,
    pub catalog: CatalogService,
    pub tokens: Arc<dyn TokenService>,
    pub health: Arc<dyn HealthProbe>,
    pub clock: Arc<dyn Clock>,
    pub auth_rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        notifier: Arc<dyn Notifier>,
        tokens: Arc<dyn TokenService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.email.max_attempts,
            initial_backoff: Duration::from_millis(config.email.initial_backoff_ms),
        };
        let notifications =
            NotificationDispatcher::new(notifier, stores.email_logs.clone(), retry);
        let settings = UserLifecycleSettings {
            verification_token_ttl: ChronoDuration::hours(
                config.registration.verification_token_ttl_hours,
            ),
        };

        let users = UserLifecycleService::new(
            stores.users,
            stores.email_logs,
            notifications,
            clock.clone(),
            settings,
        );
        let rallies =
            RallyLifecycleService::new(stores.catalog.clone(), stores.rallies.clone(), clock.clone());
        let registrations =
            RegistrationService::new(stores.rallies, stores.registrations, clock.clone());
        let catalog = CatalogService::new(stores.catalog);

        // Disabled when auth_rate_limit_per_minute is 0
        let auth_rate_limiter =
            RateLimiterState::new(config.security.auth_rate_limit_per_minute).map(Arc::new);

        Self {
            config: Arc::new(config),
            users,
            rallies,
            registrations,
            catalog,
            tokens,
            health: stores.health,
            clock,
            auth_rate_limiter,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Unauthenticated account routes, rate limited per client
    let auth_routes = Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/verify-email", post(auth::verify_email))
        .route(
            "/api/v1/auth/resend-verification",
            post(auth::resend_verification),
        )
        .route("/api/v1/auth/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_rate_limit_middleware,
        ));

    // Token-protected routes; each handler picks its principal extractor
    let api_routes = Router::new()
        .route("/api/v1/auth/me", get(auth::me))
        // Admin user management
        .route("/api/v1/admin/users", get(admin_users::list_users))
        .route("/api/v1/admin/users/stats", get(admin_users::user_stats))
        .route("/api/v1/admin/users/:id", get(admin_users::get_user))
        .route(
            "/api/v1/admin/users/:id/approve",
            post(admin_users::approve_user),
        )
        .route(
            "/api/v1/admin/users/:id/reject",
            post(admin_users::reject_user),
        )
        .route(
            "/api/v1/admin/users/:id/actions",
            get(admin_users::admin_actions),
        )
        .route(
            "/api/v1/admin/users/:id/emails",
            get(admin_users::email_logs),
        )
        // Catalog
        .route(
            "/api/v1/games",
            get(catalog::list_games).post(catalog::create_game),
        )
        .route(
            "/api/v1/games/:id",
            get(catalog::get_game)
                .put(catalog::update_game)
                .delete(catalog::delete_game),
        )
        .route(
            "/api/v1/games/:id/types",
            get(catalog::list_types).post(catalog::create_type),
        )
        .route(
            "/api/v1/types/:id",
            put(catalog::update_type).delete(catalog::delete_type),
        )
        .route(
            "/api/v1/games/:id/events",
            get(catalog::list_events).post(catalog::create_event),
        )
        .route(
            "/api/v1/events/:id",
            put(catalog::update_event).delete(catalog::delete_event),
        )
        // Rallies
        .route(
            "/api/v1/rallies",
            get(rallies::list_rallies).post(rallies::create_rally),
        )
        .route(
            "/api/v1/rallies/:id",
            get(rallies::get_rally).put(rallies::update_rally),
        )
        .route("/api/v1/rallies/:id/cancel", post(rallies::cancel_rally))
        .route(
            "/api/v1/rallies/:id/registrations",
            get(rallies::list_rally_registrations).post(rallies::register_for_rally),
        )
        // Registrations
        .route(
            "/api/v1/registrations",
            get(registrations::my_registrations),
        )
        .route(
            "/api/v1/registrations/:id",
            put(registrations::update_registration),
        )
        .route(
            "/api/v1/registrations/:id/cancel",
            post(registrations::cancel_registration),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
