//! End-to-end test of the login/token-replay flow against a served router.

use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::HeaderMap;
use serde_json::json;

use talon::prelude::*;

const TOKEN: &str = "abc123";

/// A tiny app with a login endpoint and a route protected by `X-Auth-Token`.
fn app() -> Router {
    Router::new()
        .route(
            "/login",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["username"] == "admin" && body["password"] == "hunter2" {
                    Json(json!({"auth_token": TOKEN})).into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"error": "bad credentials"})),
                    )
                        .into_response()
                }
            }),
        )
        .route(
            "/me",
            get(|headers: HeaderMap| async move {
                match headers.get("x-auth-token").and_then(|v| v.to_str().ok()) {
                    Some(token) if token == TOKEN => {
                        Json(json!({"username": "admin"})).into_response()
                    }
                    _ => (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"error": "missing or invalid token"})),
                    )
                        .into_response(),
                }
            }),
        )
}

#[tokio::test]
async fn test_login_then_authorized_request() {
    talon::trace::init();

    let mut client = TestClient::new(app()).await;

    // Unauthenticated request is rejected.
    let response = client.get("/me").send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let login = client.login("/login", "admin", "hunter2").await;
    assert_eq!(login.status(), StatusCode::OK);
    assert_eq!(client.auth_token(), Some(TOKEN));

    // The stored token now rides along automatically.
    let response = client.get("/me").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.is_json());

    let body = response.json().unwrap().unwrap();
    assert_eq!(body, json!({"username": "admin"}));

    // Cached decode: same value, no re-parse.
    let again = response.json().unwrap().unwrap();
    assert_eq!(again, body);
}

#[tokio::test]
async fn test_cleared_token_stops_riding_along() {
    let mut client = TestClient::new(app()).await;

    client.login("/login", "admin", "hunter2").await;
    client.clear_auth_token();

    let response = client.get("/me").send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response.json().unwrap().unwrap();
    assert_eq!(body["error"], "missing or invalid token");
}
