//! Request builder applying application defaults to the target URL.
//!
//! The builder derives the effective host, path, and scheme the way the
//! served application would see them in production: an explicit `base_url`
//! wins outright, a fully qualified request path brings its own authority,
//! and otherwise the [`AppConfig`](crate::config::AppConfig) defaults fill
//! the gaps. The request still travels to the bound test server; the derived
//! host rides in the `Host` header and a non-`http` scheme is conveyed as
//! `X-Forwarded-Proto`, the way a reverse proxy would.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, header};
use http_body_util::Full;
use serde::Serialize;

use crate::client::{AUTH_TOKEN_HEADER, TestClient};
use crate::response::TestResponse;

/// Builder for constructing test requests.
///
/// Obtained from [`TestClient::get`], [`TestClient::post`], and friends.
pub struct RequestBuilder<'a> {
    client: &'a TestClient,
    method: Method,
    path: String,
    base_url: Option<String>,
    subdomain: Option<String>,
    url_scheme: Option<String>,
    headers: HeaderMap,
    raw_body: Option<Bytes>,
    json_body: Option<Bytes>,
}

/// Host, path, and scheme a request resolves to before dispatch.
struct Target {
    host: String,
    path_and_query: String,
    scheme: String,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a TestClient, method: Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_string(),
            base_url: None,
            subdomain: None,
            url_scheme: None,
            headers: HeaderMap::new(),
            raw_body: None,
            json_body: None,
        }
    }

    /// Adds a header to the request.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(
            HeaderName::from_bytes(key.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    /// Sets the base URL the request path is relative to.
    ///
    /// Overrides the host, scheme, and root path derived from the client's
    /// [`AppConfig`](crate::config::AppConfig). Cannot be combined with
    /// [`subdomain`](RequestBuilder::subdomain) or
    /// [`url_scheme`](RequestBuilder::url_scheme).
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    /// Prefixes a subdomain onto the configured server name.
    pub fn subdomain(mut self, subdomain: &str) -> Self {
        self.subdomain = Some(subdomain.to_string());
        self
    }

    /// Overrides the preferred URL scheme for this request.
    pub fn url_scheme(mut self, scheme: &str) -> Self {
        self.url_scheme = Some(scheme.to_string());
        self
    }

    /// Sets a JSON body on the request and a matching content type.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.json_body = Some(Bytes::from(serde_json::to_vec(body).unwrap()));
        self.headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        self
    }

    /// Sets a form body on the request.
    pub fn form<T: Serialize>(mut self, body: &T) -> Self {
        self.raw_body = Some(Bytes::from(serde_urlencoded::to_string(body).unwrap()));
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self
    }

    /// Sets raw body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    /// Sends the request and returns the response.
    ///
    /// The client's stored auth token is attached as `X-Auth-Token` unless
    /// this builder already set that header.
    ///
    /// # Panics
    ///
    /// Panics when `base_url` was combined with `subdomain` or `url_scheme`,
    /// or when both a raw body and a JSON body were supplied.
    pub async fn send(self) -> TestResponse {
        let target = self.effective_target();

        let body = match (self.raw_body, self.json_body) {
            (Some(_), Some(_)) => {
                panic!("request cannot carry both a raw body and a JSON body")
            }
            (Some(body), None) | (None, Some(body)) => body,
            (None, None) => Bytes::new(),
        };

        let mut headers = self.headers;

        if let Some(token) = self.client.auth_token() {
            headers
                .entry(HeaderName::from_static(AUTH_TOKEN_HEADER))
                .or_insert(HeaderValue::from_str(token).unwrap());
        }

        headers.insert(header::HOST, HeaderValue::from_str(&target.host).unwrap());
        if target.scheme != "http" {
            headers.insert(
                HeaderName::from_static("x-forwarded-proto"),
                HeaderValue::from_str(&target.scheme).unwrap(),
            );
        }

        let uri = format!("http://{}{}", self.client.addr(), target.path_and_query);

        let mut builder = Request::builder().method(self.method).uri(&uri);
        for (key, value) in headers.iter() {
            builder = builder.header(key, value);
        }
        let request = builder.body(Full::new(body)).unwrap();

        self.client.send_request(request).await
    }

    /// Derives the host, path, and scheme this request resolves to.
    fn effective_target(&self) -> Target {
        if self.base_url.is_some() && (self.subdomain.is_some() || self.url_scheme.is_some()) {
            panic!("cannot combine `base_url` with `subdomain` or `url_scheme`");
        }

        if let Some(base) = &self.base_url {
            let uri: Uri = base.parse().expect("invalid base_url");
            let host = uri
                .authority()
                .expect("base_url must carry a host")
                .to_string();
            let scheme = uri.scheme_str().unwrap_or("http").to_owned();
            return Target {
                host,
                path_and_query: join_paths(uri.path(), &self.path),
                scheme,
            };
        }

        // A fully qualified path brings its own authority.
        let uri: Uri = self.path.parse().expect("invalid request path");
        if let Some(authority) = uri.authority() {
            let scheme = self
                .url_scheme
                .clone()
                .or_else(|| uri.scheme_str().map(str::to_owned))
                .unwrap_or_else(|| self.client.config().preferred_url_scheme.clone());
            let path_and_query = uri
                .path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| "/".to_owned());
            return Target {
                host: authority.to_string(),
                path_and_query,
                scheme,
            };
        }

        let config = self.client.config();
        let host = match (&self.subdomain, &config.server_name) {
            (Some(sub), Some(name)) => format!("{sub}.{name}"),
            (Some(sub), None) => format!("{sub}.localhost"),
            (None, Some(name)) => name.clone(),
            (None, None) => "localhost".to_owned(),
        };
        let scheme = self
            .url_scheme
            .clone()
            .unwrap_or_else(|| config.preferred_url_scheme.clone());
        let root = config.application_root.as_deref().unwrap_or("");

        Target {
            host,
            path_and_query: join_paths(root, &self.path),
            scheme,
        }
    }
}

/// Joins a root path and a request path into a single absolute path.
fn join_paths(root: &str, path: &str) -> String {
    let root = root.trim_matches('/');
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    if root.is_empty() {
        path
    } else {
        format!("/{root}{path}")
    }
}
