use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use courier_api::auth::{AppState, AppStateInner};
use courier_db::Database;

fn test_app() -> Router {
    let db = Database::open(Path::new(":memory:")).unwrap();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".to_string(),
    });
    courier_api::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": username,
            "password": password,
            "first_name": "Test",
            "last_name": "User",
            "phone": "555-0000",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_and_exchange_messages() {
    let app = test_app();
    register(&app, "alice", "pw1").await;
    register(&app, "bob", "pw2").await;

    // Fresh login replaces the registration token
    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "alice", "password": "pw1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let alice = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "bob", "password": "pw2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bob = body["token"].as_str().unwrap().to_string();

    // Alice sends to bob
    let (status, body) = send(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({"to_username": "bob", "body": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["from_username"], "alice");
    assert_eq!(body["message"]["to_username"], "bob");
    assert_eq!(body["message"]["body"], "hi");
    let id = body["message"]["id"].as_str().unwrap().to_string();

    // Bob's inbox shows it, unread, with alice's summary embedded
    let (status, body) = send(&app, "GET", "/users/bob/to", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], id.as_str());
    assert_eq!(messages[0]["from_user"]["username"], "alice");
    assert!(messages[0]["read_at"].is_null());

    // Alice's outbox shows the same message addressed to bob
    let (status, body) = send(&app, "GET", "/users/alice/from", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["to_user"]["username"], "bob");

    // Bob marks it read
    let (status, body) = send(
        &app,
        "POST",
        &format!("/messages/{id}/read"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["id"], id.as_str());
    assert!(!body["message"]["read_at"].is_null());

    // A re-fetch shows the read timestamp
    let (_, body) = send(&app, "GET", "/users/bob/to", Some(&bob), None).await;
    assert!(!body["messages"][0]["read_at"].is_null());
}

#[tokio::test]
async fn duplicate_registration_is_a_400() {
    let app = test_app();
    register(&app, "alice", "pw1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "alice",
            "password": "other",
            "first_name": "Another",
            "last_name": "Alice",
            "phone": "555-9999",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Username already taken");
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn login_failures_do_not_say_which_field_was_wrong() {
    let app = test_app();
    register(&app, "alice", "pw1").await;

    let (wrong_pw_status, wrong_pw_body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "alice", "password": "nope"})),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "nobody", "password": "pw1"})),
    )
    .await;

    assert_eq!(wrong_pw_status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown_status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_pw_body["error"], unknown_body["error"]);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_tampered_tokens() {
    let app = test_app();
    register(&app, "alice", "pw1").await;

    let (status, _) = send(&app, "GET", "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/users", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["status"], 401);
}

#[tokio::test]
async fn user_list_is_open_to_any_token_but_profiles_are_private() {
    let app = test_app();
    let alice = register(&app, "alice", "pw1").await;
    register(&app, "bob", "pw2").await;

    let (status, body) = send(&app, "GET", "/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    // Profile summaries only — no hashes, no timestamps
    assert!(users[0].get("password").is_none());
    assert!(users[0].get("join_at").is_none());

    let (status, body) = send(&app, "GET", "/users/alice", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert!(!body["user"]["join_at"].is_null());

    // Alice cannot read bob's profile or mailboxes
    let (status, _) = send(&app, "GET", "/users/bob", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", "/users/bob/to", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sending_to_an_unknown_user_is_a_404() {
    let app = test_app();
    let alice = register(&app, "alice", "pw1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({"to_username": "ghost", "body": "hello?"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["status"], 404);
}

#[tokio::test]
async fn message_detail_is_limited_to_the_parties() {
    let app = test_app();
    let alice = register(&app, "alice", "pw1").await;
    let bob = register(&app, "bob", "pw2").await;
    let mallory = register(&app, "mallory", "pw3").await;

    let (_, body) = send(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({"to_username": "bob", "body": "hi"})),
    )
    .await;
    let id = body["message"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/messages/{id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["from_user"]["username"], "alice");
    assert_eq!(body["message"]["to_user"]["username"], "bob");

    let (status, _) = send(&app, "GET", &format!("/messages/{id}"), Some(&mallory), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_the_recipient_marks_a_message_read() {
    let app = test_app();
    let alice = register(&app, "alice", "pw1").await;
    let bob = register(&app, "bob", "pw2").await;

    let (_, body) = send(
        &app,
        "POST",
        "/messages",
        Some(&alice),
        Some(json!({"to_username": "bob", "body": "hi"})),
    )
    .await;
    let id = body["message"]["id"].as_str().unwrap().to_string();

    // The sender may not mark their own message read
    let (status, _) = send(
        &app,
        "POST",
        &format!("/messages/{id}/read"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/messages/{id}/read"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first = body["message"]["read_at"].as_str().unwrap().to_string();

    // Marking again is a no-op that keeps the first timestamp
    let (status, body) = send(
        &app,
        "POST",
        &format!("/messages/{id}/read"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["read_at"].as_str().unwrap(), first);
}

#[tokio::test]
async fn marking_an_unknown_message_read_is_a_404() {
    let app = test_app();
    let alice = register(&app, "alice", "pw1").await;

    let (status, _) = send(
        &app,
        "POST",
        "/messages/00000000-0000-0000-0000-000000000099/read",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
