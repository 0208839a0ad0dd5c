//! Traits for the token-endpoint operations
//!
//! Abstracts the two network operations behind a trait so the lifecycle
//! manager can be exercised with mock implementations.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::TokenSet;

/// Trait for the provider's token-grant operations
///
/// Both operations are idempotent to repeat after a failure, but each
/// success mints a real token server-side — callers must not invoke them
/// speculatively. The lifecycle manager is the only intended caller.
#[async_trait]
pub trait TokenGrant: Send + Sync {
    /// Exchange the stored end-user credentials for a token pair
    /// (grant_type=password).
    ///
    /// # Errors
    /// `Timeout` when the request exceeds the configured timeout,
    /// `InvalidCredentials` when the provider rejects the grant,
    /// `Provider`/`MalformedResponse` for provider-side failures.
    async fn password_grant(&self, scope: &str) -> Result<TokenSet, AuthError>;

    /// Mint a new access token from a refresh token
    /// (grant_type=refresh_token).
    ///
    /// Refresh fields absent from the response are left empty; the caller
    /// merges them from the previous token set.
    ///
    /// # Errors
    /// `RefreshTokenInvalid` when the provider rejects the refresh token —
    /// the manager's signal to fall back to a full re-authentication.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;
}
