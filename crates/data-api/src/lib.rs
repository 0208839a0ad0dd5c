//! Authenticated request façade over the iRacing data API
//!
//! The data API sits behind the OAuth token lifecycle manager from
//! `iracing-auth`: before every outbound call the façade asks its
//! [`AccessTokenProvider`] for a token valid at the moment of use and
//! attaches it as a bearer header. Resource-specific request/response
//! shaping is deliberately out of scope; callers get the raw JSON.

pub mod client;
pub mod error;

pub use client::{AccessTokenProvider, DataApiClient};
pub use error::DataApiError;
