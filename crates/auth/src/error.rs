//! Error types for the OAuth client and token lifecycle manager

use crate::config::ConfigError;

/// Error type for authentication and token lifecycle operations
///
/// All payloads are owned strings so the error is `Clone`: a single
/// authenticate/refresh attempt can fan its outcome out to every caller
/// waiting on it.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Invalid or missing configuration; never reaches the network layer
    Config(String),

    /// The token endpoint did not respond within the request timeout
    Timeout,

    /// Connection-level failure (DNS, TLS, refused connection)
    Network(String),

    /// The provider rejected the password grant (HTTP 400/401)
    InvalidCredentials(String),

    /// The provider rejected the refresh token (HTTP 400/401).
    ///
    /// Internal signal: the manager falls back to a fresh password grant
    /// instead of surfacing this to callers.
    RefreshTokenInvalid(String),

    /// Provider-side failure (5xx or other unexpected status)
    Provider { status: Option<u16>, message: String },

    /// The provider returned a success status with an unparsable body
    MalformedResponse(String),

    /// No tokens available and the operation cannot mint any
    NotAuthenticated,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Timeout => write!(f, "Token endpoint request timed out"),
            Self::Network(msg) => write!(f, "Network error: {msg}"),
            Self::InvalidCredentials(msg) => write!(f, "Invalid credentials: {msg}"),
            Self::RefreshTokenInvalid(msg) => write!(f, "Refresh token rejected: {msg}"),
            Self::Provider { status: Some(status), message } => {
                write!(f, "Provider error (HTTP {status}): {message}")
            }
            Self::Provider { status: None, message } => write!(f, "Provider error: {message}"),
            Self::MalformedResponse(msg) => write!(f, "Malformed token response: {msg}"),
            Self::NotAuthenticated => write!(f, "Not authenticated (no tokens)"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    /// Whether a subsequent call may reasonably succeed without any
    /// configuration or credential change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::Provider { .. } | Self::MalformedResponse(_) => {
                true
            }
            Self::Config(_)
            | Self::InvalidCredentials(_)
            | Self::RefreshTokenInvalid(_)
            | Self::NotAuthenticated => false,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
