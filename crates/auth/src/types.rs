//! OAuth 2.0 types for the password-limited grant
//!
//! Defines the credential set, the provider's token-endpoint wire contract
//! (RFC 6749), and the in-memory token state with absolute expiry instants.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;

/// Registered client plus end-user credentials
///
/// Immutable after construction. All four fields are validated non-empty by
/// the configuration layer before any network activity.
#[derive(Clone)]
pub struct Credentials {
    /// OAuth client ID of the registered application
    pub client_id: String,
    /// OAuth client secret of the registered application
    pub client_secret: String,
    /// End-user account name
    pub username: String,
    /// End-user password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A valid access token handed out to callers
///
/// Returned by `ensure_valid_token`; carries the expiry instant so callers
/// can log or schedule around it without re-querying the manager.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer token value for the Authorization header
    pub token: String,
    /// Absolute expiry instant of the token
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken").field("expires_at", &self.expires_at).finish_non_exhaustive()
    }
}

/// OAuth 2.0 access and refresh tokens with absolute expiry instants
///
/// The lifecycle manager holds `Option<TokenSet>`; absence of the whole set
/// models the unauthenticated state, so an access token always carries its
/// expiry. Expiries are wall-clock instants computed once when the provider
/// response was received, not remaining durations, so repeated checks never
/// re-derive drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Bearer access token for API authentication
    pub access_token: String,

    /// Token type (always "Bearer" for this provider)
    pub token_type: String,

    /// Absolute expiry instant of the access token
    pub expires_at: DateTime<Utc>,

    /// Refresh token for obtaining new access tokens without re-submitting
    /// the user's password
    pub refresh_token: Option<String>,

    /// Absolute expiry instant of the refresh token, when reported
    pub refresh_expires_at: Option<DateTime<Utc>>,

    /// Granted scopes (space-separated), when reported
    pub scope: Option<String>,
}

impl TokenSet {
    /// Build a `TokenSet` from a provider response, converting the relative
    /// TTLs to absolute instants anchored at `received_at`.
    #[must_use]
    pub fn from_response(response: TokenResponse, received_at: DateTime<Utc>) -> Self {
        let refresh_expires_at = response
            .refresh_token_expires_in
            .map(|secs| received_at + ChronoDuration::seconds(secs));

        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at: received_at + ChronoDuration::seconds(response.expires_in),
            refresh_token: response.refresh_token,
            refresh_expires_at,
            scope: response.scope,
        }
    }

    /// Fill refresh fields the provider omitted from a refresh response.
    ///
    /// An absent `refresh_token` / `refresh_token_expires_in` means
    /// "unchanged from the previous value".
    #[must_use]
    pub fn with_refresh_fallback(mut self, previous: &TokenSet) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
        if self.refresh_expires_at.is_none() {
            self.refresh_expires_at = previous.refresh_expires_at;
        }
        self
    }

    /// Whether the access token is valid at `now` (strictly before expiry).
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whether a proactive refresh is due at `now`.
    ///
    /// Inclusive at the buffer boundary: exactly `buffer` before expiry
    /// already counts as stale.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: ChronoDuration) -> bool {
        self.expires_at.checked_sub_signed(buffer).map_or(true, |edge| now >= edge)
    }

    /// The refresh token, if one is present and not itself expired at `now`.
    #[must_use]
    pub fn usable_refresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.refresh_token.as_deref()?;
        match self.refresh_expires_at {
            Some(expires_at) if now >= expires_at => None,
            _ => Some(token),
        }
    }

    /// The access token as the value handed out to callers.
    #[must_use]
    pub fn access_token(&self) -> AccessToken {
        AccessToken { token: self.access_token.clone(), expires_at: self.expires_at }
    }
}

/// Token response from the authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749). The field names are
/// the provider's contract; do not rename them.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    /// Refresh token lifetime in seconds, when the provider rotates it
    pub refresh_token_expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Error response from the authorization server (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}
