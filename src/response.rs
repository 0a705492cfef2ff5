//! Responses returned by the test client, with lazy cached JSON decoding.
//!
//! The JSON capability lives in the [`JsonBody`] trait so any body-carrying
//! type can opt in by supplying the four accessor methods; [`TestResponse`]
//! is the implementation the client hands back. Decoded values are memoized
//! in a [`JsonCache`] with separate slots for strict and silent decoding, so
//! a body is never parsed twice for the same mode.

use std::sync::OnceLock;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Memoized JSON decode results.
///
/// One slot per decode mode. `Some(None)` in the silent slot records a decode
/// failure that was silenced; an empty slot means that mode has not decoded
/// yet (or caching was bypassed).
#[derive(Debug, Default)]
pub struct JsonCache {
    decoded_strict: OnceLock<Option<Value>>,
    decoded_silent: OnceLock<Option<Value>>,
}

impl JsonCache {
    fn get(&self, silent: bool) -> Option<&Option<Value>> {
        if silent {
            self.decoded_silent.get()
        } else {
            self.decoded_strict.get()
        }
    }

    fn fill(&self, silent: bool, value: Option<Value>) {
        let slot = if silent {
            &self.decoded_silent
        } else {
            &self.decoded_strict
        };
        // A second fill for the same mode keeps the first value.
        let _ = slot.set(value);
    }
}

/// Knobs for [`JsonBody::get_json`].
#[derive(Debug, Clone, Copy)]
pub struct JsonOptions {
    /// Decode even when the mimetype does not indicate JSON.
    pub force: bool,
    /// Turn decode failures into `Ok(None)` instead of an error.
    pub silent: bool,
    /// Memoize the result and serve it on later calls.
    pub cache: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            force: false,
            silent: false,
            cache: true,
        }
    }
}

impl JsonOptions {
    /// Strict decoding with caching (the defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Silences decode failures.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Decodes regardless of mimetype.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Bypasses the cache for both reading and writing.
    pub fn uncached(mut self) -> Self {
        self.cache = false;
        self
    }
}

/// JSON parsing capability for body-carrying types.
///
/// Supply the accessors and the decoding, caching, and failure handling come
/// for free. Override [`on_json_loading_failed`](JsonBody::on_json_loading_failed)
/// to substitute a fallback value for malformed bodies; whatever it returns
/// becomes the cached strict result.
pub trait JsonBody {
    /// Raw body bytes to decode.
    fn body_bytes(&self) -> &Bytes;

    /// Lowercased mimetype with parameters stripped, empty when unknown.
    fn mimetype(&self) -> String;

    /// Memoization slots for decoded values.
    fn json_cache(&self) -> &JsonCache;

    /// Whether decode diagnostics are included in failure messages.
    fn debug(&self) -> bool {
        false
    }

    /// True when the mimetype is `application/json` or `application/*+json`.
    fn is_json(&self) -> bool {
        let mt = self.mimetype();
        mt == "application/json" || (mt.starts_with("application/") && mt.ends_with("+json"))
    }

    /// Shorthand for [`get_json`](JsonBody::get_json) with default options:
    /// strict, cached, mimetype-gated.
    fn json(&self) -> Result<Option<Value>> {
        self.get_json(JsonOptions::default())
    }

    /// Parse the body as JSON.
    ///
    /// Returns `Ok(None)` without decoding (or caching) when the mimetype
    /// does not indicate JSON and `force` is off. A cached value for the
    /// requested mode is returned without re-decoding unless `cache` is off.
    fn get_json(&self, opts: JsonOptions) -> Result<Option<Value>> {
        if opts.cache {
            if let Some(cached) = self.json_cache().get(opts.silent) {
                return Ok(cached.clone());
            }
        }

        if !opts.force && !self.is_json() {
            return Ok(None);
        }

        match serde_json::from_slice::<Value>(self.body_bytes()) {
            Ok(value) => {
                if opts.cache {
                    // A successful decode satisfies both modes.
                    self.json_cache().fill(false, Some(value.clone()));
                    self.json_cache().fill(true, Some(value.clone()));
                }
                Ok(Some(value))
            }
            Err(_) if opts.silent => {
                if opts.cache {
                    self.json_cache().fill(true, None);
                }
                Ok(None)
            }
            Err(err) => {
                let fallback = self.on_json_loading_failed(err)?;
                if opts.cache {
                    self.json_cache().fill(false, fallback.clone());
                }
                Ok(fallback)
            }
        }
    }

    /// Called when a strict decode fails.
    ///
    /// The default returns a 400-class [`Error`]; the decode diagnostic is
    /// appended only when [`debug`](JsonBody::debug) is on.
    fn on_json_loading_failed(&self, err: serde_json::Error) -> Result<Option<Value>> {
        if self.debug() {
            Err(Error::bad_request(format!(
                "failed to decode JSON object: {err}"
            )))
        } else {
            Err(Error::bad_request("failed to decode JSON object"))
        }
    }
}

/// Response captured from a request issued by the test client.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    debug: bool,
    cache: JsonCache,
}

impl TestResponse {
    /// Creates a response from its parts. Useful for testing code that
    /// consumes [`TestResponse`] without going through a server.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            debug: false,
            cache: JsonCache::default(),
        }
    }

    /// Sets whether strict decode failures carry diagnostic detail.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Returns the HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the response body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Returns the response body as raw bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Deserializes the response body into a concrete type.
    ///
    /// Panics on malformed bodies; use [`try_json_as`](TestResponse::try_json_as)
    /// or the [`JsonBody`] methods to handle failures.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Attempts to deserialize the response body into a concrete type.
    pub fn try_json_as<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl JsonBody for TestResponse {
    fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    fn mimetype(&self) -> String {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn json_cache(&self) -> &JsonCache {
        &self.cache
    }

    fn debug(&self) -> bool {
        self.debug
    }
}
