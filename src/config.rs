//! Application defaults consumed when building test requests.
//!
//! [`AppConfig`] mirrors the configuration a deployed application would carry:
//! the server name requests appear to target, the root path the application is
//! mounted under, the URL scheme to assume, and whether diagnostic detail is
//! included in decode errors. Values can be set programmatically or loaded
//! from environment variables and `.env` files.

use std::env;
use std::str::FromStr;

/// Load environment variables from a `.env` file if one exists.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Get a required environment variable.
///
/// Returns an error if the variable is not set.
pub fn get_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

/// Get an optional environment variable with a default value.
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an environment variable with a default.
pub fn get_env_parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Environment variable is not set.
    Missing(String),
    /// Environment variable value is invalid.
    Invalid { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "Missing required environment variable '{}'", key)
            }
            ConfigError::Invalid { key, value } => {
                write!(
                    f,
                    "Invalid value '{}' for environment variable '{}' (failed to parse as expected type)",
                    value, key
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Defaults applied when a request does not spell out its own target.
///
/// # Examples
///
/// ```
/// use talon::config::AppConfig;
///
/// let config = AppConfig::new()
///     .server_name("api.example.test")
///     .application_root("v1")
///     .preferred_url_scheme("https");
/// assert_eq!(config.server_name.as_deref(), Some("api.example.test"));
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host requests appear to target when none is given (`Host` header).
    pub server_name: Option<String>,
    /// Root path the application is mounted under; prefixed onto request paths.
    pub application_root: Option<String>,
    /// Scheme assumed when neither the path nor the builder names one.
    pub preferred_url_scheme: String,
    /// Include decode diagnostics in strict JSON failure messages.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            application_root: None,
            preferred_url_scheme: "http".to_string(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name used for the `Host` header.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Sets the root path the application is mounted under.
    pub fn application_root(mut self, root: impl Into<String>) -> Self {
        self.application_root = Some(root.into());
        self
    }

    /// Sets the scheme assumed for derived URLs.
    pub fn preferred_url_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.preferred_url_scheme = scheme.into();
        self
    }

    /// Enables or disables decode diagnostics in error messages.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Loads configuration from `SERVER_NAME`, `APPLICATION_ROOT`,
    /// `PREFERRED_URL_SCHEME`, and `APP_DEBUG`, after loading `.env` if present.
    pub fn from_env() -> Self {
        load_dotenv();

        Self {
            server_name: env::var("SERVER_NAME").ok(),
            application_root: env::var("APPLICATION_ROOT").ok(),
            preferred_url_scheme: get_env_or("PREFERRED_URL_SCHEME", "http"),
            debug: get_env_parsed_or("APP_DEBUG", false),
        }
    }
}
