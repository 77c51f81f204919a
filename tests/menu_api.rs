//! End-to-end tests of the menu routes over an in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use fiesta_menu_api::{
    build_router,
    middleware::auth::JwtSecret,
    models::auth::Claims,
    services::menu::MenuService,
    store::MemoryStore,
    AppState,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn create_test_app() -> Router {
    app_with_store(MemoryStore::with_accounts([1, 2]))
}

fn app_with_store(store: MemoryStore) -> Router {
    let store = Arc::new(store);
    let state = AppState {
        menus: Arc::new(MenuService::new(store.clone(), 137)),
        ledger: store,
    };
    build_router(state, JwtSecret(SECRET.into()))
}

fn token_for(username: &str, grp_id: i64) -> String {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: username.into(),
        grp_id,
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn propose(app: &Router, token: &str, items: Value, date: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/menu",
        Some(token),
        Some(json!({ "items": items, "date": date })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["menu_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_menu_requires_token() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::GET, "/menu?status=pending", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_propose_then_fetch_pending() {
    let app = create_test_app();
    let token = token_for("asha", 1);
    let menu_id = propose(&app, &token, json!(["rice", "curry"]), "2024-05-01T09:30:00.000Z").await;

    let (status, body) = send(&app, Method::GET, "/menu?status=pending", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], true);
    assert_eq!(body["menu_id"], menu_id);
    assert_eq!(body["items"], json!(["rice", "curry"]));
    assert_eq!(body["date"], "2024-05-01T09:30:00Z");
}

#[tokio::test]
async fn test_propose_validates_body() {
    let app = create_test_app();
    let token = token_for("asha", 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/menu",
        Some(&token),
        Some(json!({ "items": [], "date": "2024-05-01T09:30:00.000Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::POST,
        "/menu",
        Some(&token),
        Some(json!({ "items": ["rice"], "date": "someday" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::POST,
        "/menu",
        Some(&token),
        Some(json!({ "date": "2024-05-01T09:30:00.000Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_publish_credits_group_once() {
    let app = create_test_app();
    let token = token_for("asha", 1);
    let menu_id = propose(&app, &token, json!(["rice"]), "2024-05-01T09:30:00.000Z").await;

    let publish = json!({ "menu_id": menu_id, "status": "published" });
    let (status, body) = send(&app, Method::PUT, "/menu", Some(&token), Some(publish.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "success");

    let (_, body) = send(&app, Method::GET, "/menu?status=published", Some(&token), None).await;
    assert_eq!(body["menu_id"], menu_id);

    let (status, body) = send(&app, Method::PUT, "/menu", Some(&token), Some(publish)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (status, body) = send(&app, Method::GET, "/account/balance", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 137);
}

#[tokio::test]
async fn test_reject_and_empty_lookup() {
    let app = create_test_app();
    let token = token_for("asha", 1);

    let (status, body) = send(&app, Method::GET, "/menu?status=rejected", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], false);
    assert_eq!(body["message"], "No such menu found.");

    let menu_id = propose(&app, &token, json!(["rice"]), "2024-05-01T09:30:00.000Z").await;
    let (status, _) = send(
        &app,
        Method::PUT,
        "/menu",
        Some(&token_for("ravi", 1)),
        Some(json!({ "menu_id": menu_id, "status": "rejected", "comments": "too bland" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/menu?status=rejected", Some(&token), None).await;
    assert_eq!(body["menu_id"], menu_id);
    let (_, body) = send(&app, Method::GET, "/menu?status=pending", Some(&token), None).await;
    assert_eq!(body["found"], false);
}

#[tokio::test]
async fn test_unknown_menu_is_not_found() {
    let app = create_test_app();
    let token = token_for("asha", 1);
    let (status, body) = send(
        &app,
        Method::PUT,
        "/menu",
        Some(&token),
        Some(json!({ "menu_id": 99, "status": "rejected", "comments": "no" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_status_is_rejected() {
    let app = create_test_app();
    let token = token_for("asha", 1);
    let (status, body) = send(
        &app,
        Method::GET,
        "/menu?status=not%20published",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_patch_item() {
    let app = create_test_app();
    let token = token_for("asha", 1);
    let menu_id = propose(&app, &token, json!(["rice", "curry"]), "2024-05-01T09:30:00.000Z").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/menu/{menu_id}"),
        Some(&token),
        Some(json!({ "old_item": "curry", "new_item": "noodles" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_item"], "noodles");
    assert_eq!(body["menu_id"], menu_id);

    let (_, body) = send(&app, Method::GET, "/menu?status=pending", Some(&token), None).await;
    assert_eq!(body["items"], json!(["rice", "noodles"]));

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/menu/{menu_id}"),
        Some(&token),
        Some(json!({ "old_item": "pizza", "new_item": "pasta" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_groups_are_isolated() {
    let app = create_test_app();
    let menu_id = propose(&app, &token_for("asha", 1), json!(["rice"]), "2024-05-01T09:30:00.000Z").await;

    let other = token_for("mei", 2);
    let (status, _) = send(
        &app,
        Method::PUT,
        "/menu",
        Some(&other),
        Some(json!({ "menu_id": menu_id, "status": "published" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, Method::GET, "/account/balance", Some(&other), None).await;
    assert_eq!(body["balance"], 0);
}

#[tokio::test]
async fn test_first_proposal_opens_group_account() {
    let app = app_with_store(MemoryStore::new());
    let token = token_for("asha", 5);

    let (status, body) = send(&app, Method::GET, "/account/balance", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ACCOUNT_NOT_FOUND");

    let menu_id = propose(&app, &token, json!(["rice"]), "2024-05-01T09:30:00.000Z").await;
    let (status, _) = send(
        &app,
        Method::PUT,
        "/menu",
        Some(&token),
        Some(json!({ "menu_id": menu_id, "status": "published" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/account/balance", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 137);
}

#[tokio::test]
async fn test_republish_after_revert_keeps_balance() {
    let app = create_test_app();
    let token = token_for("asha", 1);
    let menu_id = propose(&app, &token, json!(["rice"]), "2024-05-01T09:30:00.000Z").await;

    for status in ["published", "pending", "published", "not_published", "published"] {
        let (code, body) = send(
            &app,
            Method::PUT,
            "/menu",
            Some(&token),
            Some(json!({ "menu_id": menu_id, "status": status })),
        )
        .await;
        assert_eq!(code, StatusCode::OK, "{status}: {body}");
    }

    let (_, body) = send(&app, Method::GET, "/account/balance", Some(&token), None).await;
    assert_eq!(body["balance"], 137);
}
