//! Integration tests for the catalog, rally lifecycle and registrations.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_rally_status_follows_the_clock() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let rally_id = app.create_rally(&admin).await;
    let uri = format!("/api/v1/rallies/{rally_id}");

    let (status, body) = app.get(&uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayStatus"], "upcoming");
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
    assert_eq!(body["events"][0]["eventOrder"], 1);

    app.clock.advance(Duration::days(6));
    let (_, body) = app.get(&uri, &admin).await;
    assert_eq!(body["displayStatus"], "active");

    let (_, body) = app.get("/api/v1/rallies?status=active", &admin).await;
    assert_eq!(body["rallies"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/v1/rallies?status=upcoming", &admin).await;
    assert!(body["rallies"].as_array().unwrap().is_empty());

    app.clock.advance(Duration::days(5));
    let (_, body) = app.get(&uri, &admin).await;
    assert_eq!(body["displayStatus"], "past");

    let (status, body) = app.put(&uri, &admin, json!({ "notes": "Too late" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot modify past rallies");

    let (status, body) = app
        .post(&format!("{uri}/cancel"), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot cancel past rallies");
}

#[tokio::test]
async fn test_create_rally_validates_dates_and_role() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, driver) = app.approved_driver(&admin).await;
    let (game_id, type_id, events) = app.seed_catalog(&admin).await;
    let now = app.now();

    let body = |rally_days: i64, reg_days: i64| {
        json!({
            "gameId": game_id,
            "typeId": type_id,
            "eventIds": events,
            "rallyDate": now + Duration::days(rally_days),
            "registrationEndingDate": now + Duration::days(reg_days),
        })
    };

    let (status, _) = app.post("/api/v1/rallies", &admin, body(5, 5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body_json) = app.post("/api/v1/rallies", &admin, body(-1, -2)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body_json["message"], "Rally date must be in the future");

    let (status, _) = app.post("/api/v1/rallies", &driver, body(10, 5)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/v1/rallies", &admin, body(10, 5)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["displayStatus"], "upcoming");
    assert_eq!(created["gameId"], game_id.to_string());

    let mut duplicate = body(10, 5);
    duplicate["eventIds"] = json!([events[0], events[0]]);
    let (status, body_json) = app.post("/api/v1/rallies", &admin, duplicate).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body_json["message"], "Duplicate events are not allowed");
}

#[tokio::test]
async fn test_update_and_cancel_rally() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let rally_id = app.create_rally(&admin).await;
    let uri = format!("/api/v1/rallies/{rally_id}");

    let new_end = app.now() + Duration::days(3);
    let (status, body) = app
        .put(&uri, &admin, json!({ "registrationEndingDate": new_end }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notes"], "Night stages");

    let (status, _) = app
        .put(
            &uri,
            &admin,
            json!({ "registrationEndingDate": app.now() + Duration::days(20) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("{uri}/cancel"),
            &admin,
            json!({ "reason": "Server maintenance" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayStatus"], "cancelled");
    assert_eq!(body["cancellationReason"], "Server maintenance");

    let (status, _) = app
        .post(&format!("{uri}/cancel"), &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.put(&uri, &admin, json!({ "notes": "Back on" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot modify cancelled rallies");
}

#[tokio::test]
async fn test_registration_lifecycle() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver_id, driver) = app.approved_driver(&admin).await;
    let rally_id = app.create_rally(&admin).await;
    let register_uri = format!("/api/v1/rallies/{rally_id}/registrations");

    let (status, registration) = app
        .post(&register_uri, &driver, json!({ "carSetup": "Soft gravel" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registration["status"], "confirmed");
    assert_eq!(registration["userId"], driver_id.to_string());
    let registration_id = registration["id"].as_str().unwrap().to_string();

    let (status, body) = app.post(&register_uri, &driver, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Already registered for this rally");

    let (status, body) = app
        .put(
            &format!("/api/v1/registrations/{registration_id}"),
            &driver,
            json!({ "notes": "First rally" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notes"], "First rally");
    assert_eq!(body["carSetup"], "Soft gravel");

    let (_, mine) = app.get("/api/v1/registrations", &driver).await;
    assert_eq!(mine["registrations"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&register_uri, &driver).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, roster) = app.get(&register_uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster["registrations"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .post(
            &format!("/api/v1/registrations/{registration_id}/cancel"),
            &driver,
            json!({ "reason": "Car broke" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // A cancelled registration still blocks a second one.
    let (status, _) = app.post(&register_uri, &driver, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_registration_closes_at_deadline() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, early) = app.approved_driver(&admin).await;
    let (_, late) = app.approved_driver(&admin).await;
    let rally_id = app.create_rally(&admin).await;
    let register_uri = format!("/api/v1/rallies/{rally_id}/registrations");

    let (status, registration) = app.post(&register_uri, &early, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let registration_id = registration["id"].as_str().unwrap().to_string();

    app.clock.advance(Duration::days(6));
    let (status, body) = app.post(&register_uri, &late, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Rally not found or registration closed");

    // Details can still change until the rally starts.
    let (status, _) = app
        .put(
            &format!("/api/v1/registrations/{registration_id}"),
            &early,
            json!({ "carSetup": "Tarmac" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::days(5));
    let (status, body) = app
        .post(
            &format!("/api/v1/registrations/{registration_id}/cancel"),
            &early,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cannot cancel registrations for past rallies");
}

#[tokio::test]
async fn test_registrations_are_private_to_their_owner() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, owner) = app.approved_driver(&admin).await;
    let (_, other) = app.approved_driver(&admin).await;
    let rally_id = app.create_rally(&admin).await;

    let (_, registration) = app
        .post(
            &format!("/api/v1/rallies/{rally_id}/registrations"),
            &owner,
            json!({}),
        )
        .await;
    let registration_id = registration["id"].as_str().unwrap();

    let (status, _) = app
        .put(
            &format!("/api/v1/registrations/{registration_id}"),
            &other,
            json!({ "notes": "Hijack" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancelled_rally_rejects_registrations() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, driver) = app.approved_driver(&admin).await;
    let rally_id = app.create_rally(&admin).await;

    app.post(
        &format!("/api/v1/rallies/{rally_id}/cancel"),
        &admin,
        json!({}),
    )
    .await;

    let (status, _) = app
        .post(
            &format!("/api/v1/rallies/{rally_id}/registrations"),
            &driver,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/api/v1/rallies/{}/registrations", Uuid::new_v4()),
            &driver,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_management() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (_, driver) = app.approved_driver(&admin).await;
    let (game_id, type_id, events) = app.seed_catalog(&admin).await;

    let (status, _) = app
        .post("/api/v1/games", &driver, json!({ "name": "Richard Burns Rally" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .get(&format!("/api/v1/games/{game_id}/events"), &driver)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"].as_array().unwrap().len(), 2);

    // Retire one event; drivers stop seeing it, admins can ask for it.
    let (status, body) = app
        .put(
            &format!("/api/v1/events/{}", events[1]),
            &admin,
            json!({ "isActive": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);

    let (_, body) = app
        .get(
            &format!("/api/v1/games/{game_id}/events?includeInactive=true"),
            &driver,
        )
        .await;
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
    let (_, body) = app
        .get(
            &format!("/api/v1/games/{game_id}/events?includeInactive=true"),
            &admin,
        )
        .await;
    assert_eq!(body["events"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/games/{game_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/types/{type_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/v1/types/{type_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
