//! Common test utilities for integration tests.
//!
//! The router is built over the in-memory stores from `domain::testing`, a
//! recording notifier and a manual clock, so these tests need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use domain::services::Notifier;
use fake::{faker::name::en::Name, Fake};
use domain::testing::{InMemoryStore, ManualClock, RecordingNotifier};
use rally_api::app::{create_app, AppState, Stores};
use rally_api::config::Config;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Rally2024!";
pub const ADMIN_EMAIL: &str = "admin@rally.test";
pub const ADMIN_PASSWORD: &str = "Adm1nistrator!";

/// Generate a unique email for testing.
pub fn unique_test_email() -> String {
    format!("driver_{}@example.com", Uuid::new_v4().simple())
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_overrides(&[])
    }

    pub fn with_overrides(overrides: &[(&str, &str)]) -> Self {
        Self::build(overrides, Arc::new(RecordingNotifier::new()))
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(&[], Arc::new(notifier))
    }

    fn build(overrides: &[(&str, &str)], notifier: Arc<RecordingNotifier>) -> Self {
        let config = Config::load_for_test(overrides).expect("test config");
        let tokens = config.jwt.build().expect("test token service");
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::default());

        let stores = Stores {
            users: store.clone(),
            email_logs: store.clone(),
            catalog: store.clone(),
            rallies: store.clone(),
            registrations: store.clone(),
            health: store.clone(),
        };
        let state = AppState::new(
            config,
            stores,
            notifier.clone() as Arc<dyn Notifier>,
            Arc::new(tokens),
            clock.clone(),
        );

        Self {
            router: create_app(state.clone()),
            state,
            store,
            notifier,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use domain::services::Clock;
        self.clock.now()
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    /// Registers through the API and returns the new user id.
    pub async fn register(&self, email: &str) -> Uuid {
        let name: String = Name().fake();
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["user"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn verify(&self, email: &str) {
        let token = self.notifier.last_token_for(email).expect("verification token");
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/verify-email",
                None,
                Some(json!({ "token": token })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "verify failed: {body}");
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn token_for(&self, email: &str, password: &str) -> String {
        let (status, body) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Bootstraps the admin account and logs it in.
    pub async fn admin_token(&self) -> String {
        self.state
            .users
            .bootstrap_admin(ADMIN_EMAIL, ADMIN_PASSWORD, "Race Control")
            .await
            .unwrap();
        self.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registered, verified and approved driver; returns (user id, token).
    pub async fn approved_driver(&self, admin_token: &str) -> (Uuid, String) {
        let email = unique_test_email();
        let user_id = self.register(&email).await;
        self.verify(&email).await;
        let (status, body) = self
            .post(
                &format!("/api/v1/admin/users/{user_id}/approve"),
                admin_token,
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "approve failed: {body}");
        (user_id, self.token_for(&email, PASSWORD).await)
    }

    /// Game with one type and two events; returns (game, type, [events]).
    pub async fn seed_catalog(&self, admin_token: &str) -> (Uuid, Uuid, Vec<Uuid>) {
        let id = |v: &Value| v["id"].as_str().unwrap().parse::<Uuid>().unwrap();

        let (status, game) = self
            .post(
                "/api/v1/games",
                admin_token,
                json!({ "name": format!("WRC {}", Uuid::new_v4().simple()) }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{game}");
        let game_id = id(&game);

        let (_, rally_type) = self
            .post(
                &format!("/api/v1/games/{game_id}/types"),
                admin_token,
                json!({ "name": "Championship" }),
            )
            .await;
        let mut events = Vec::new();
        for name in ["Rally Finland", "Rally Sweden"] {
            let (status, event) = self
                .post(
                    &format!("/api/v1/games/{game_id}/events"),
                    admin_token,
                    json!({ "name": name }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{event}");
            events.push(id(&event));
        }
        (game_id, id(&rally_type), events)
    }

    /// Rally at now + 10 days, registration closing at now + 5 days.
    pub async fn create_rally(&self, admin_token: &str) -> Uuid {
        let (game_id, type_id, events) = self.seed_catalog(admin_token).await;
        let now = self.now();
        let (status, rally) = self
            .post(
                "/api/v1/rallies",
                admin_token,
                json!({
                    "gameId": game_id,
                    "typeId": type_id,
                    "eventIds": events,
                    "rallyDate": now + Duration::days(10),
                    "registrationEndingDate": now + Duration::days(5),
                    "notes": "Night stages"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create rally failed: {rally}");
        rally["id"].as_str().unwrap().parse().unwrap()
    }
}
