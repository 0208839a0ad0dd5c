//! OAuth 2.0 client for the password-limited grant
//!
//! Performs the two token-endpoint operations:
//! - password grant: initial credential exchange for an access+refresh pair
//! - refresh grant: minting a new access token from a refresh token
//!
//! Pure request/response logic; token state is owned by the lifecycle
//! manager.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::AuthError;
use crate::traits::TokenGrant;
use crate::types::{Credentials, ErrorResponse, TokenResponse, TokenSet};

/// Which grant a token-endpoint call was performing, for error mapping.
#[derive(Debug, Clone, Copy)]
enum GrantKind {
    Password,
    Refresh,
}

/// OAuth 2.0 client for the iRacing token endpoint
///
/// Every request is bounded by the configured request timeout. Responses are
/// converted to [`TokenSet`]s with absolute expiry instants anchored at the
/// moment the response was received, using the injected clock.
#[derive(Debug, Clone)]
pub struct OAuthClient<T: Clock = SystemClock> {
    token_url: String,
    credentials: Credentials,
    http: Client,
    clock: Arc<T>,
}

impl OAuthClient<SystemClock> {
    /// Create a new OAuth client from configuration, using the system clock.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }
}

impl<T: Clock> OAuthClient<T> {
    /// Create a new OAuth client with an explicit clock (used by tests).
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be constructed.
    pub fn with_clock(config: &Config, clock: Arc<T>) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            token_url: config.token_url.clone(),
            credentials: config.credentials.clone(),
            http,
            clock,
        })
    }

    /// The configured token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn token_request(
        &self,
        kind: GrantKind,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, AuthError> {
        let response = self.http.post(&self.token_url).form(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(grant_error(kind, status, &body));
        }

        // Anchor the relative TTLs at the instant the response came back.
        let received_at = self.clock.now_utc();
        let body: TokenResponse =
            response.json().await.map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        Ok(TokenSet::from_response(body, received_at))
    }
}

/// Map a non-2xx token-endpoint response onto the error taxonomy.
///
/// 400/401 mean the grant itself was rejected; which error that is depends
/// on the grant being performed. Everything else is a provider failure.
fn grant_error(kind: GrantKind, status: StatusCode, body: &str) -> AuthError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.to_string(),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body.trim().to_string(),
    };

    match (kind, status) {
        (GrantKind::Password, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) => {
            AuthError::InvalidCredentials(message)
        }
        (GrantKind::Refresh, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) => {
            AuthError::RefreshTokenInvalid(message)
        }
        _ => AuthError::Provider { status: Some(status.as_u16()), message },
    }
}

#[async_trait]
impl<T: Clock> TokenGrant for OAuthClient<T> {
    async fn password_grant(&self, scope: &str) -> Result<TokenSet, AuthError> {
        debug!(scope, "requesting password grant");

        let params = [
            ("grant_type", "password"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            ("scope", scope),
        ];

        self.token_request(GrantKind::Password, &params).await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        debug!("requesting refresh grant");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        self.token_request(GrantKind::Refresh, &params).await
    }
}
