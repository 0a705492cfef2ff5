//! Test client that serves an axum application and replays auth tokens.

use std::net::SocketAddr;

use axum::Router;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, Request, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::request::RequestBuilder;
use crate::response::{JsonBody, TestResponse};

/// Header carrying the auth token on outgoing requests.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// A test client for making HTTP requests to an axum application.
///
/// The client serves the router on a random local port and tears it down
/// when dropped. After a successful [`login`](TestClient::login), the
/// returned auth token rides along on every later request as the
/// `X-Auth-Token` header, unless the caller sets that header explicitly.
///
/// # Examples
///
/// ```ignore
/// use axum::{routing::get, Router};
/// use talon::prelude::*;
///
/// #[tokio::test]
/// async fn test_hello() {
///     let app = Router::new().route("/", get(|| async { "Hello!" }));
///
///     let client = TestClient::new(app).await;
///     let response = client.get("/").send().await;
///
///     assert_eq!(response.status(), StatusCode::OK);
///     assert_eq!(response.text(), "Hello!");
/// }
/// ```
pub struct TestClient {
    addr: SocketAddr,
    config: AppConfig,
    auth_token: Option<String>,
    client: Client<HttpConnector, Full<Bytes>>,
    _shutdown: oneshot::Sender<()>,
}

impl TestClient {
    /// Creates a test client with default [`AppConfig`].
    pub async fn new(app: Router) -> Self {
        Self::with_config(app, AppConfig::default()).await
    }

    /// Creates a test client, applying the given application defaults to
    /// every request built through it.
    ///
    /// This spawns a background server on a random available port.
    pub async fn with_config(app: Router, config: AppConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%err, "test server terminated unexpectedly");
            }
        });

        let client = Client::builder(TokioExecutor::new()).build_http();

        Self {
            addr,
            config,
            auth_token: None,
            client,
            _shutdown: shutdown_tx,
        }
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Creates a POST request builder.
    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    /// Creates a HEAD request builder.
    pub fn head(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::HEAD, path)
    }

    /// Creates a request builder with the given method and path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, path)
    }

    /// Logs in through `path` and stores the returned auth token.
    ///
    /// Issues a POST with the JSON body `{"username", "password"}` and reads
    /// `auth_token` out of the response JSON. Every later request from this
    /// client carries the token until it is overwritten or cleared.
    ///
    /// # Panics
    ///
    /// Panics when the response carries no JSON, or its `auth_token` field
    /// is missing or empty. The stored token is left untouched in that case.
    pub async fn login(&mut self, path: &str, username: &str, password: &str) -> TestResponse {
        let response = self
            .post(path)
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await;

        let token = response
            .json()
            .ok()
            .flatten()
            .and_then(|v| v.get("auth_token").and_then(|t| t.as_str().map(str::to_owned)));

        match token {
            Some(token) if !token.is_empty() => {
                debug!(path, "login succeeded, auth token stored");
                self.auth_token = Some(token);
            }
            _ => panic!("login response from {path} did not contain an auth token"),
        }

        response
    }

    /// Dispatches a pre-built request.
    ///
    /// The stored auth token is injected unless the request already carries
    /// an `X-Auth-Token` header. The request URI is rewritten to target the
    /// bound server address; an authority on the original URI is preserved
    /// as the `Host` header.
    pub async fn dispatch(&self, mut request: Request<Full<Bytes>>) -> TestResponse {
        if let Some(token) = &self.auth_token {
            request
                .headers_mut()
                .entry(HeaderName::from_static(AUTH_TOKEN_HEADER))
                .or_insert(HeaderValue::from_str(token).unwrap());
        }

        if let Some(authority) = request.uri().authority() {
            let host = HeaderValue::from_str(authority.as_str()).unwrap();
            request.headers_mut().entry(header::HOST).or_insert(host);
        }

        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| "/".to_owned());
        let uri: Uri = format!("http://{}{}", self.addr, path_and_query)
            .parse()
            .unwrap();
        *request.uri_mut() = uri;

        self.send_request(request).await
    }

    pub(crate) async fn send_request(&self, request: Request<Full<Bytes>>) -> TestResponse {
        debug!(method = %request.method(), uri = %request.uri(), "dispatching test request");

        let response = self.client.request(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse::new(status, headers, body).with_debug(self.config.debug)
    }

    /// Returns the currently stored auth token, if any.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Replaces the stored auth token.
    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.auth_token = Some(token.into());
    }

    /// Forgets the stored auth token.
    pub fn clear_auth_token(&mut self) {
        self.auth_token = None;
    }

    /// Returns the application defaults this client was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the address the test server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::routing::{get, post};
    use http::{HeaderMap, StatusCode};
    use serde_json::{Value, json};

    async fn echo_token(headers: HeaderMap) -> String {
        headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned()
    }

    fn app_with_token_echo() -> Router {
        Router::new().route("/whoami", get(echo_token))
    }

    #[tokio::test]
    async fn test_client_get() {
        let app = Router::new().route("/", get(|| async { "Hello!" }));

        let client = TestClient::new(app).await;
        let response = client.get("/").send().await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "Hello!");
    }

    #[tokio::test]
    async fn test_client_post_json() {
        let app = Router::new().route(
            "/echo",
            post(|body: Bytes| async move { String::from_utf8_lossy(&body).to_string() }),
        );

        let client = TestClient::new(app).await;
        let response = client
            .post("/echo")
            .json(&json!({"name": "test"}))
            .send()
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.text().contains("test"));
    }

    #[tokio::test]
    async fn test_no_token_header_before_login() {
        let client = TestClient::new(app_with_token_echo()).await;
        let response = client.get("/whoami").send().await;
        assert_eq!(response.text(), "");
    }

    #[tokio::test]
    async fn test_login_stores_and_replays_token() {
        let app = app_with_token_echo().route(
            "/login",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["username"], "admin");
                assert_eq!(body["password"], "hunter2");
                Json(json!({"auth_token": "abc123"}))
            }),
        );

        let mut client = TestClient::new(app).await;
        client.login("/login", "admin", "hunter2").await;

        assert_eq!(client.auth_token(), Some("abc123"));

        let response = client.get("/whoami").send().await;
        assert_eq!(response.text(), "abc123");
    }

    #[tokio::test]
    #[should_panic(expected = "did not contain an auth token")]
    async fn test_login_without_token_panics() {
        let app = Router::new().route("/login", post(|| async { Json(json!({"ok": true})) }));

        let mut client = TestClient::new(app).await;
        client.login("/login", "admin", "hunter2").await;
    }

    #[tokio::test]
    #[should_panic(expected = "did not contain an auth token")]
    async fn test_login_with_empty_token_panics() {
        let app = Router::new().route("/login", post(|| async { Json(json!({"auth_token": ""})) }));

        let mut client = TestClient::new(app).await;
        client.login("/login", "admin", "hunter2").await;
    }

    #[tokio::test]
    async fn test_caller_supplied_token_wins() {
        let mut client = TestClient::new(app_with_token_echo()).await;
        client.set_auth_token("stored");

        let response = client
            .get("/whoami")
            .header(AUTH_TOKEN_HEADER, "explicit")
            .send()
            .await;
        assert_eq!(response.text(), "explicit");
    }

    #[tokio::test]
    async fn test_clear_auth_token() {
        let mut client = TestClient::new(app_with_token_echo()).await;
        client.set_auth_token("stored");
        client.clear_auth_token();

        let response = client.get("/whoami").send().await;
        assert_eq!(response.text(), "");
    }

    #[tokio::test]
    async fn test_dispatch_prebuilt_request() {
        let mut client = TestClient::new(app_with_token_echo()).await;
        client.set_auth_token("stored");

        let request = Request::builder()
            .method(Method::GET)
            .uri("http://app.example.test/whoami")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = client.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "stored");
    }

    #[tokio::test]
    async fn test_dispatch_preserves_authority_as_host() {
        let app = Router::new().route(
            "/host",
            get(|headers: HeaderMap| async move {
                headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_owned()
            }),
        );

        let client = TestClient::new(app).await;
        let request = Request::builder()
            .method(Method::GET)
            .uri("http://app.example.test/host")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = client.dispatch(request).await;
        assert_eq!(response.text(), "app.example.test");
    }

    #[tokio::test]
    async fn test_client_json_response() {
        let app = Router::new().route("/json", get(|| async { Json(json!({"id": 1})) }));

        let client = TestClient::new(app).await;
        let response = client.get("/json").send().await;

        assert!(response.is_json());
        let value = response.json().unwrap().unwrap();
        assert_eq!(value, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_client_not_found() {
        let client = TestClient::new(Router::new()).await;
        let response = client.get("/nonexistent").send().await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_client_addr() {
        let client = TestClient::new(Router::new()).await;
        let addr = client.addr();

        assert!(addr.port() > 0);
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_debug_flag_reaches_response() {
        let app = Router::new().route(
            "/bad",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    "not-json".to_owned(),
                )
            }),
        );

        let client = TestClient::with_config(app, AppConfig::new().debug(true)).await;
        let response = client.get("/bad").send().await;

        let err = response.json().unwrap_err();
        assert!(err.message.starts_with("failed to decode JSON object: "));
    }
}
