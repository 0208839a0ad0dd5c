//! Test support utilities
//!
//! A scripted [`TokenGrant`] implementation and a token-set builder, used by
//! the unit tests here and the integration tests under `tests/`.

// Mocks are test support: clear panics beat graceful degradation.
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::AuthError;
use crate::traits::TokenGrant;
use crate::types::TokenSet;

type Outcome = Result<TokenSet, AuthError>;

/// Build a token set minted at `minted_at`.
///
/// `refresh` is `(token, expires_in_seconds)` when the set carries a refresh
/// token.
#[must_use]
pub fn token_set(
    access_token: &str,
    minted_at: DateTime<Utc>,
    expires_in: i64,
    refresh: Option<(&str, i64)>,
) -> TokenSet {
    TokenSet {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_at: minted_at + ChronoDuration::seconds(expires_in),
        refresh_token: refresh.map(|(token, _)| token.to_string()),
        refresh_expires_at: refresh
            .map(|(_, expires_in)| minted_at + ChronoDuration::seconds(expires_in)),
        scope: Some("iracing.auth".to_string()),
    }
}

/// Scripted [`TokenGrant`] mock
///
/// Outcomes are queued per grant type and popped in order; an exhausted
/// queue yields a distinctive provider error so an unexpected extra call
/// fails the test loudly. Clones share state, so a test can keep a handle
/// for scripting and assertions after handing the mock to a manager.
#[derive(Clone, Default)]
pub struct MockTokenGrant {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    password_queue: Mutex<VecDeque<Outcome>>,
    refresh_queue: Mutex<VecDeque<Outcome>>,
    password_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

impl MockTokenGrant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next password grant call.
    pub fn push_password_outcome(&self, outcome: Outcome) {
        self.inner
            .password_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Queue the outcome of the next refresh grant call.
    pub fn push_refresh_outcome(&self, outcome: Outcome) {
        self.inner.refresh_queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(outcome);
    }

    /// Delay every grant call, widening the window concurrency tests race
    /// in.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Number of password grant calls made so far.
    #[must_use]
    pub fn password_calls(&self) -> usize {
        self.inner.password_calls.load(Ordering::SeqCst)
    }

    /// Number of refresh grant calls made so far.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let latency = *self.inner.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn pop(queue: &Mutex<VecDeque<Outcome>>, grant: &str) -> Outcome {
        queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front().unwrap_or_else(|| {
            Err(AuthError::Provider {
                status: None,
                message: format!("no scripted {grant} outcome left"),
            })
        })
    }
}

#[async_trait]
impl TokenGrant for MockTokenGrant {
    async fn password_grant(&self, _scope: &str) -> Outcome {
        self.inner.password_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::pop(&self.inner.password_queue, "password")
    }

    async fn refresh_grant(&self, _refresh_token: &str) -> Outcome {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::pop(&self.inner.refresh_queue, "refresh")
    }
}
