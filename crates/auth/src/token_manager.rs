//! Token lifecycle manager with proactive refresh
//!
//! Owns the token state and guarantees that:
//! - `ensure_valid_token` hands out a token valid at the moment of use,
//!   refreshing it transparently once it is within the refresh buffer
//! - at most one authenticate-or-refresh network operation is in flight at
//!   any time; concurrent callers wait for, and receive, that attempt's
//!   outcome instead of issuing their own request
//! - token state commits are atomic: readers see the old complete set or
//!   the new complete set, never a mix

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client::OAuthClient;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::AuthError;
use crate::traits::TokenGrant;
use crate::types::{AccessToken, TokenSet};

/// What a single-flight attempt should do once it holds the guard.
enum Attempt {
    /// Unconditional password grant with an explicit scope
    Authenticate { scope: String },
    /// Refresh if possible, authenticate otherwise
    EnsureFresh,
}

/// Token lifecycle manager
///
/// Generic over the grant operations and the clock so tests can swap in a
/// scripted grant and a manually-advanced clock.
pub struct TokenManager<C, T = SystemClock>
where
    C: TokenGrant + 'static,
    T: Clock + 'static,
{
    grant: Arc<C>,
    clock: Arc<T>,
    tokens: RwLock<Option<TokenSet>>,
    refresh_buffer: ChronoDuration,
    default_scope: String,

    // Single-flight state: the guard serializes attempts, the sequence
    // counter and last error let late arrivals adopt a completed attempt's
    // outcome instead of issuing another network call.
    flight: Mutex<()>,
    attempt_seq: AtomicU64,
    last_error: StdMutex<Option<AuthError>>,
}

impl TokenManager<OAuthClient> {
    /// Create a manager backed by a real [`OAuthClient`] and the system
    /// clock.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let client = OAuthClient::new(config)?;
        Ok(Self::with_clock(
            client,
            Arc::new(SystemClock),
            config.refresh_buffer,
            config.scope.clone(),
        ))
    }
}

impl<C> TokenManager<C>
where
    C: TokenGrant + 'static,
{
    /// Create a manager over any grant implementation, using the system
    /// clock.
    #[must_use]
    pub fn new(grant: C, refresh_buffer: Duration, default_scope: impl Into<String>) -> Self {
        Self::with_clock(grant, Arc::new(SystemClock), refresh_buffer, default_scope)
    }
}

impl<C, T> TokenManager<C, T>
where
    C: TokenGrant + 'static,
    T: Clock + 'static,
{
    /// Create a manager with an explicit clock (used by tests).
    #[must_use]
    pub fn with_clock(
        grant: C,
        clock: Arc<T>,
        refresh_buffer: Duration,
        default_scope: impl Into<String>,
    ) -> Self {
        Self {
            grant: Arc::new(grant),
            clock,
            tokens: RwLock::new(None),
            refresh_buffer: ChronoDuration::from_std(refresh_buffer)
                .unwrap_or(ChronoDuration::MAX),
            default_scope: default_scope.into(),
            flight: Mutex::new(()),
            attempt_seq: AtomicU64::new(0),
            last_error: StdMutex::new(None),
        }
    }

    /// Perform a password grant for the given scope and commit the resulting
    /// token set.
    ///
    /// Joins an in-flight authenticate/refresh attempt if one exists;
    /// otherwise performs its own grant even when already authenticated
    /// (used to obtain a different scope).
    ///
    /// # Errors
    /// Surfaces the grant's [`AuthError`]; token state is left untouched on
    /// failure.
    pub async fn authenticate(&self, scope: &str) -> Result<AccessToken, AuthError> {
        self.run_single_flight(Attempt::Authenticate { scope: scope.to_string() }).await
    }

    /// Return an access token valid at the moment of return.
    ///
    /// Fast path: the cached token is outside the refresh buffer and is
    /// returned as-is. Otherwise exactly one refresh-or-authenticate attempt
    /// runs per staleness window, shared by every concurrent caller. A
    /// rejected refresh token falls back to a fresh password grant with the
    /// stored credentials.
    ///
    /// # Errors
    /// `Timeout`/`Provider` failures surface to the caller with the previous
    /// token state untouched, so a later call can retry.
    pub async fn ensure_valid_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cached_fresh_token().await {
            return Ok(token);
        }
        self.run_single_flight(Attempt::EnsureFresh).await
    }

    /// Whether a token is present and strictly before its expiry instant.
    ///
    /// Pure read; never triggers network I/O.
    pub async fn is_authenticated(&self) -> bool {
        let now = self.clock.now_utc();
        self.tokens.read().await.as_ref().map_or(false, |t| t.is_valid(now))
    }

    /// Expiry instant of the current access token, if any.
    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.read().await.as_ref().map(|t| t.expires_at)
    }

    /// Expiry instant of the current refresh token, if any.
    pub async fn refresh_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.read().await.as_ref().and_then(|t| t.refresh_expires_at)
    }

    /// Scope string granted by the provider, if any.
    pub async fn granted_scope(&self) -> Option<String> {
        self.tokens.read().await.as_ref().and_then(|t| t.scope.clone())
    }

    async fn cached_fresh_token(&self) -> Option<AccessToken> {
        let now = self.clock.now_utc();
        let tokens = self.tokens.read().await;
        tokens
            .as_ref()
            .filter(|t| !t.needs_refresh(now, self.refresh_buffer))
            .map(TokenSet::access_token)
    }

    /// Run `attempt` with the single-flight guarantee.
    ///
    /// The flight guard is held across the network call; a timed-out call
    /// returns an error and releases it like any other completion. Callers
    /// that were blocked on the guard while an attempt completed adopt that
    /// attempt's outcome instead of issuing another request.
    async fn run_single_flight(&self, attempt: Attempt) -> Result<AccessToken, AuthError> {
        let seq_before = self.attempt_seq.load(Ordering::Acquire);
        let _guard = self.flight.lock().await;

        if self.attempt_seq.load(Ordering::Acquire) != seq_before {
            let adopted = self.last_error.lock().unwrap_or_else(PoisonError::into_inner).clone();
            match adopted {
                Some(err) => {
                    debug!("adopting failure of the attempt that was in flight");
                    return Err(err);
                }
                None => {
                    if let Some(token) = self.cached_fresh_token().await {
                        debug!("adopting token minted by the attempt that was in flight");
                        return Ok(token);
                    }
                    // The adopted token has already gone stale again; fall
                    // through and run our own attempt under the guard.
                }
            }
        }

        let result = match attempt {
            Attempt::Authenticate { scope } => self.authenticate_and_commit(&scope).await,
            Attempt::EnsureFresh => self.refresh_or_authenticate().await,
        };

        {
            let mut last_error = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
            *last_error = result.as_ref().err().cloned();
        }
        self.attempt_seq.fetch_add(1, Ordering::Release);

        result
    }

    async fn refresh_or_authenticate(&self) -> Result<AccessToken, AuthError> {
        let now = self.clock.now_utc();
        let previous = { self.tokens.read().await.clone() };

        let Some(previous) = previous else {
            return self.authenticate_and_commit(&self.default_scope).await;
        };

        let scope = previous.scope.clone().unwrap_or_else(|| self.default_scope.clone());

        let Some(refresh_token) = previous.usable_refresh_token(now).map(str::to_string) else {
            debug!("no usable refresh token, re-authenticating");
            return self.authenticate_and_commit(&scope).await;
        };

        match self.grant.refresh_grant(&refresh_token).await {
            Ok(minted) => {
                let merged = minted.with_refresh_fallback(&previous);
                info!(expires_at = %merged.expires_at, "access token refreshed");
                Ok(self.commit(merged).await)
            }
            Err(AuthError::RefreshTokenInvalid(reason)) => {
                // The provider rejected the refresh token; fall back to a
                // full re-authentication with the stored credentials.
                warn!(%reason, "refresh token rejected, re-authenticating");
                self.authenticate_and_commit(&scope).await
            }
            Err(err) => {
                // Previous token set stays in place so a later call can
                // attempt recovery.
                warn!(error = %err, "token refresh failed");
                Err(err)
            }
        }
    }

    async fn authenticate_and_commit(&self, scope: &str) -> Result<AccessToken, AuthError> {
        match self.grant.password_grant(scope).await {
            Ok(minted) => {
                info!(scope, expires_at = %minted.expires_at, "authenticated");
                Ok(self.commit(minted).await)
            }
            Err(err) => {
                warn!(error = %err, "authentication failed");
                Err(err)
            }
        }
    }

    /// Swap in the new token set in one write; readers never observe a
    /// partially-applied update.
    async fn commit(&self, set: TokenSet) -> AccessToken {
        let access = set.access_token();
        *self.tokens.write().await = Some(set);
        access
    }
}
