//! Configuration loaded from the environment
//!
//! Reads the client credentials and tunables from environment variables,
//! optionally populated from a `.env` file. Every required value is validated
//! here, before any network activity, so a misconfigured process fails fast
//! with a [`ConfigError`] instead of a confusing provider rejection.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::types::Credentials;

/// Default OAuth scope requested when `IRACING_SCOPE` is not set.
pub const DEFAULT_SCOPE: &str = "iracing.auth";

/// Default token endpoint of the iRacing identity provider.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.iracing.com/oauth2/token";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_BUFFER_SECS: u64 = 60;

/// Error type for configuration loading
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    #[error("{0} must not be empty")]
    EmptyVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid token URL {url}: {reason}")]
    InvalidTokenUrl { url: String, reason: String },
}

/// Log output format, selected via `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable console output
    Human,
    /// Newline-delimited JSON
    Json,
}

/// Immutable client configuration
///
/// Construct via [`Config::from_env`] / [`Config::from_env_file`], or build
/// the struct directly in tests.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registered client plus end-user credentials for the password grant
    pub credentials: Credentials,
    /// OAuth scope requested on authentication
    pub scope: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Upper bound for each token-endpoint request
    pub request_timeout: Duration,
    /// Proactive refresh margin before access-token expiry
    pub refresh_buffer: Duration,
    /// Tracing filter directive (e.g. "info", "iracing_auth=debug")
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment, reading a `.env`
    /// file from the current directory if one exists.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a required variable is missing or empty,
    /// or when a tunable fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the variables may come from the
        // process environment directly.
        dotenvy::dotenv().ok();
        Self::from_current_env()
    }

    /// Load configuration after populating the environment from a specific
    /// `.env` file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a required variable is missing or empty,
    /// or when a tunable fails validation.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref()).ok();
        Self::from_current_env()
    }

    fn from_current_env() -> Result<Self, ConfigError> {
        let credentials = Credentials {
            client_id: require("IRACING_CLIENT_ID")?,
            client_secret: require("IRACING_CLIENT_SECRET")?,
            username: require("IRACING_USERNAME")?,
            password: require("IRACING_PASSWORD")?,
        };

        let scope = optional("IRACING_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string());
        let token_url =
            optional("IRACING_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
        Url::parse(&token_url).map_err(|e| ConfigError::InvalidTokenUrl {
            url: token_url.clone(),
            reason: e.to_string(),
        })?;

        let request_timeout = Duration::from_secs(parse_seconds(
            "REQUEST_TIMEOUT",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: "REQUEST_TIMEOUT",
                value: "0".to_string(),
            });
        }

        let refresh_buffer = Duration::from_secs(parse_seconds(
            "TOKEN_REFRESH_BUFFER_SECONDS",
            DEFAULT_REFRESH_BUFFER_SECS,
        )?);

        let log_level = optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let log_format = match optional("LOG_FORMAT").as_deref() {
            None => LogFormat::Human,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "human" => LogFormat::Human,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::InvalidValue {
                        var: "LOG_FORMAT",
                        value: other.to_string(),
                    })
                }
            },
        };

        Ok(Self {
            credentials,
            scope,
            token_url,
            request_timeout,
            refresh_buffer,
            log_level,
            log_format,
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyVar(var)),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::MissingVar(var)),
    }
}

fn optional(var: &'static str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_seconds(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional(var) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}
