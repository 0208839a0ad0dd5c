//! Integration tests for the OAuth client and token lifecycle manager
//!
//! Exercises the real HTTP path against a wiremock token endpoint; time is
//! driven by a manually-advanced clock, never by sleeping.

use std::sync::Arc;
use std::time::Duration;

use iracing_auth::{
    AuthError, Config, Credentials, LogFormat, MockClock, OAuthClient, TokenManager,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/oauth2/token";

fn test_config(server_uri: &str) -> Config {
    Config {
        credentials: Credentials {
            client_id: "test_client".to_string(),
            client_secret: "test_secret".to_string(),
            username: "driver".to_string(),
            password: "hunter2".to_string(),
        },
        scope: "iracing.auth".to_string(),
        token_url: format!("{server_uri}{TOKEN_PATH}"),
        request_timeout: Duration::from_secs(5),
        refresh_buffer: Duration::from_secs(60),
        log_level: "info".to_string(),
        log_format: LogFormat::Human,
    }
}

fn manager_against(
    server_uri: &str,
    clock: Arc<MockClock>,
) -> TokenManager<OAuthClient<MockClock>, MockClock> {
    let config = test_config(server_uri);
    let client = OAuthClient::with_clock(&config, clock.clone()).expect("http client");
    TokenManager::with_clock(client, clock, config.refresh_buffer, config.scope)
}

fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 300,
        "refresh_token": refresh,
        "refresh_token_expires_in": 7200,
        "scope": "iracing.auth"
    })
}

async fn mount_password_grant(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, refresh)))
        .mount(server)
        .await;
}

/// The password grant carries the provider-defined form fields and yields a
/// committed token set.
#[tokio::test(flavor = "multi_thread")]
async fn password_grant_uses_the_provider_wire_contract() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "access_v1", "refresh_v1").await;

    let clock = Arc::new(MockClock::new());
    let manager = manager_against(&server.uri(), clock);

    let token = manager.authenticate("iracing.auth").await.expect("authenticate");
    assert_eq!(token.token, "access_v1");
    assert!(manager.is_authenticated().await);
    assert_eq!(manager.granted_scope().await.as_deref(), Some("iracing.auth"));

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8_lossy(&requests[0].body).to_string();
    for field in [
        "grant_type=password",
        "client_id=test_client",
        "client_secret=test_secret",
        "username=driver",
        "password=hunter2",
        "scope=iracing.auth",
    ] {
        assert!(body.contains(field), "missing {field} in {body}");
    }
}

/// Round-trip: authenticate, cross the refresh buffer, and ensure a fresh
/// token is minted via the refresh grant with a strictly later expiry.
#[tokio::test(flavor = "multi_thread")]
async fn crossing_the_buffer_refreshes_via_the_refresh_grant() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "access_v1", "refresh_v1").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh_v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access_v2", "refresh_v2")))
        .expect(1)
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let manager = manager_against(&server.uri(), clock.clone());

    let first = manager.authenticate("iracing.auth").await.expect("authenticate");

    // Well outside the buffer: the cached token is handed back untouched.
    clock.advance(Duration::from_secs(239));
    let cached = manager.ensure_valid_token().await.expect("cached token");
    assert_eq!(cached.token, "access_v1");

    // 59 seconds of validity left: inside the 60s buffer.
    clock.advance(Duration::from_secs(2));
    let refreshed = manager.ensure_valid_token().await.expect("refreshed token");
    assert_eq!(refreshed.token, "access_v2");
    assert!(refreshed.expires_at > first.expires_at);

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 2);
}

/// HTTP 401 on the initial password grant maps to `InvalidCredentials` and
/// leaves the token state fully empty.
#[tokio::test(flavor = "multi_thread")]
async fn rejected_password_grant_leaves_state_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "invalid username or password"
        })))
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let manager = manager_against(&server.uri(), clock);

    let err = manager.authenticate("iracing.auth").await.expect_err("must fail");
    match err {
        AuthError::InvalidCredentials(msg) => assert!(msg.contains("invalid_grant")),
        other => panic!("expected InvalidCredentials, got {other:?}"),
    }
    assert!(!manager.is_authenticated().await);
    assert!(manager.token_expires_at().await.is_none());
    assert!(manager.refresh_token_expires_at().await.is_none());
}

/// A provider-rejected refresh token falls back to a fresh password grant;
/// the caller sees only the new token.
#[tokio::test(flavor = "multi_thread")]
async fn rejected_refresh_token_recovers_via_password_grant() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "access_vN", "refresh_vN").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let manager = manager_against(&server.uri(), clock.clone());

    manager.authenticate("iracing.auth").await.expect("authenticate");
    clock.advance(Duration::from_secs(241));

    let token = manager.ensure_valid_token().await.expect("fallback token");
    assert_eq!(token.token, "access_vN");

    // password grant (initial) + refresh attempt + password grant (fallback)
    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 3);
}

/// A timed-out refresh surfaces `Timeout`, leaves the previous token state
/// untouched, and releases the single-flight guard so the next call can
/// retry instead of deadlocking.
#[tokio::test(flavor = "multi_thread")]
async fn timeout_surfaces_and_releases_the_flight_guard() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "access_v1", "refresh_v1").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("access_v2", "refresh_v2"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let mut config = test_config(&server.uri());
    config.request_timeout = Duration::from_millis(200);
    let client = OAuthClient::with_clock(&config, clock.clone()).expect("http client");
    let manager = TokenManager::with_clock(client, clock.clone(), config.refresh_buffer, config.scope);

    manager.authenticate("iracing.auth").await.expect("authenticate");
    let expiry_before = manager.token_expires_at().await;

    clock.advance(Duration::from_secs(241));
    let err = manager.ensure_valid_token().await.expect_err("must time out");
    assert!(matches!(err, AuthError::Timeout), "got {err:?}");
    assert_eq!(manager.token_expires_at().await, expiry_before);

    // The guard was released: the next call runs its own attempt.
    let err = manager.ensure_valid_token().await.expect_err("times out again");
    assert!(matches!(err, AuthError::Timeout), "got {err:?}");
}

/// Provider 5xx during refresh is surfaced as-is with state untouched.
#[tokio::test(flavor = "multi_thread")]
async fn provider_error_during_refresh_preserves_state() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "access_v1", "refresh_v1").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let manager = manager_against(&server.uri(), clock.clone());

    manager.authenticate("iracing.auth").await.expect("authenticate");
    let expiry_before = manager.token_expires_at().await;

    clock.advance(Duration::from_secs(241));
    let err = manager.ensure_valid_token().await.expect_err("provider down");
    assert!(matches!(err, AuthError::Provider { status: Some(503), .. }), "got {err:?}");
    assert_eq!(manager.token_expires_at().await, expiry_before);
}

/// A success status with an unparsable body maps to `MalformedResponse`.
#[tokio::test(flavor = "multi_thread")]
async fn unparsable_success_body_is_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>surprise</html>"))
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let manager = manager_against(&server.uri(), clock);

    let err = manager.authenticate("iracing.auth").await.expect_err("must fail");
    assert!(matches!(err, AuthError::MalformedResponse(_)), "got {err:?}");
    assert!(!manager.is_authenticated().await);
}

/// Concurrent stale callers collapse into a single refresh request on the
/// wire; wiremock's `expect(1)` verifies the count on shutdown.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_stale_callers_make_one_wire_request() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "access_v1", "refresh_v1").await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("access_v2", "refresh_v2"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let clock = Arc::new(MockClock::new());
    let manager = Arc::new(manager_against(&server.uri(), clock.clone()));

    manager.authenticate("iracing.auth").await.expect("authenticate");
    clock.advance(Duration::from_secs(241));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.ensure_valid_token().await }));
    }

    for handle in handles {
        let token = handle.await.expect("task").expect("token");
        assert_eq!(token.token, "access_v2");
    }
}
