//! Token-replaying test client and JSON-aware responses for axum applications.
//!
//! Talon serves your `axum::Router` on an ephemeral local port and gives you
//! a client that remembers the auth token handed out by a login endpoint,
//! replaying it as the `X-Auth-Token` header on every later request. Responses
//! come back as [`response::TestResponse`], which decodes JSON lazily and
//! caches the result.
//!
//! # Quick start
//!
//! ```ignore
//! use axum::{routing::post, Router};
//! use talon::prelude::*;
//!
//! #[tokio::test]
//! async fn login_then_fetch() {
//!     let app = Router::new().route("/login", post(login_handler));
//!
//!     let mut client = TestClient::new(app).await;
//!     client.login("/login", "admin", "hunter2").await;
//!
//!     let response = client.get("/me").send().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//!     let body = response.json().unwrap();
//!     assert!(body.is_some());
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod trace;

pub mod prelude {
    pub use crate::client::TestClient;
    pub use crate::config::AppConfig;
    pub use crate::error::{Error, Result};
    pub use crate::request::RequestBuilder;
    pub use crate::response::{JsonBody, JsonOptions, TestResponse};

    pub use http::{Method, StatusCode};
}
