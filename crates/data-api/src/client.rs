//! Authenticated data-API client
//!
//! Thin façade over the iRacing data API: every outbound request asks the
//! token provider for a token that is valid right now and attaches it as a
//! bearer `Authorization` header. Tokens are never cached here — freshness
//! is the provider's concern, which is what makes mid-request expiry a
//! non-issue for callers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iracing_auth::{AccessToken, AuthError, Clock, TokenGrant, TokenManager};
use reqwest::Client;
use tracing::debug;

use crate::error::DataApiError;

/// Provides bearer tokens valid at the moment of the call.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Retrieve a token to authorize an outbound data-API request.
    ///
    /// # Errors
    /// Surfaces the provider's [`AuthError`] when no valid token can be
    /// obtained.
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}

/// The token lifecycle manager is the canonical provider: each request goes
/// through `ensure_valid_token`, so the façade never uses a token known to
/// be stale.
#[async_trait]
impl<C, T> AccessTokenProvider for TokenManager<C, T>
where
    C: TokenGrant + 'static,
    T: Clock + 'static,
{
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        self.ensure_valid_token().await
    }
}

/// Authenticated client for the iRacing data API
///
/// Carries no retry or response-shaping logic; callers own their retry
/// policy and interpret the returned JSON themselves.
pub struct DataApiClient<P: AccessTokenProvider> {
    base_url: String,
    http: Client,
    tokens: Arc<P>,
}

impl<P: AccessTokenProvider> DataApiClient<P> {
    /// Create a new data-API client.
    ///
    /// # Errors
    /// Returns `DataApiError::Config` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<P>,
        request_timeout: Duration,
    ) -> Result<Self, DataApiError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DataApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url: base_url.into(), http, tokens })
    }

    /// Perform an authenticated GET and return the raw JSON body.
    ///
    /// # Errors
    /// `Auth` when no valid token can be obtained, `UnexpectedStatus` for
    /// non-2xx answers, `Request`/`Decode` for transport and body failures.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, DataApiError> {
        let token = self.tokens.access_token().await?;

        let url =
            format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        debug!(%url, "data api request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token.token)
            .send()
            .await
            .map_err(|e| DataApiError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataApiError::UnexpectedStatus {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        response.json().await.map_err(|e| DataApiError::Decode(e.to_string()))
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
