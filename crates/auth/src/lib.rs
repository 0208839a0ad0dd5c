//! OAuth2 password-limited-grant client for the iRacing identity provider
//!
//! Authenticates with the registered client and end-user credentials, then
//! manages the resulting access/refresh token pair so that any caller asking
//! for "the current token" receives one that is valid at the moment of use.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │    TokenManager    │  Token lifecycle + single-flight refresh
//! └─────────┬──────────┘
//!           │
//!           ├──► OAuthClient   (password / refresh grants over HTTP)
//!           ├──► TokenSet      (absolute-expiry token state)
//!           └──► Clock         (injected time source)
//! ```
//!
//! `TokenManager::ensure_valid_token` is the operation data-API callers rely
//! on: it returns the cached token while it is comfortably valid, refreshes
//! it once it is inside the configured buffer before expiry, and falls back
//! to a fresh password grant when the refresh token itself is rejected. At
//! most one authenticate-or-refresh request is in flight at any time;
//! concurrent callers share that attempt's outcome.
//!
//! # Usage
//!
//! ```no_run
//! use iracing_auth::{telemetry, Config, TokenManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     telemetry::init(&config);
//!
//!     let manager = TokenManager::from_config(&config)?;
//!
//!     let token = manager.authenticate(&config.scope).await?;
//!     println!("authenticated, token expires at {}", token.expires_at);
//!
//!     // Later, per outbound request:
//!     let token = manager.ensure_valid_token().await?;
//!     println!("bearer {}...", &token.token[..8.min(token.token.len())]);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod testing;
pub mod token_manager;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use client::OAuthClient;
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{Config, ConfigError, LogFormat, DEFAULT_SCOPE, DEFAULT_TOKEN_URL};
pub use error::AuthError;
pub use token_manager::TokenManager;
pub use traits::TokenGrant;
pub use types::{AccessToken, Credentials, ErrorResponse, TokenResponse, TokenSet};
