use super::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::broadcast::error::TryRecvError;

const USER_ID: &str = "6f1c1d2e-8a9b-4c3d-9e0f-112233445566";
const ANON_KEY: &str = "anon";

// =============================================================================
// Mock identity REST API
// =============================================================================

#[derive(Clone)]
struct MockIdentityApi {
    expires_in: i64,
    logout_status: u16,
    refreshes: Arc<AtomicUsize>,
    logouts: Arc<AtomicUsize>,
}

impl MockIdentityApi {
    fn new() -> Self {
        Self { expires_in: 3600, logout_status: 204, refreshes: Arc::default(), logouts: Arc::default() }
    }
}

fn session_json(access_token: &str, expires_in: i64) -> Json<Value> {
    Json(json!({
        "access_token": access_token,
        "refresh_token": "refresh-1",
        "expires_in": expires_in,
        "token_type": "bearer",
        "user": { "id": USER_ID, "email": "ada@example.com" },
    }))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn token(
    State(api): State<MockIdentityApi>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No API key found in request" })));
    }
    match params.get("grant_type").map(String::as_str) {
        Some("password") => {
            if body["email"] == "ada@example.com" && body["password"] == "hunter22" {
                (StatusCode::OK, session_json("access-1", api.expires_in))
            } else {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
                )
            }
        }
        Some("refresh_token") => {
            api.refreshes.fetch_add(1, Ordering::SeqCst);
            if body["refresh_token"] == "refresh-1" {
                (StatusCode::OK, session_json("access-2", 3600))
            } else {
                (StatusCode::BAD_REQUEST, Json(json!({ "error_description": "Invalid Refresh Token" })))
            }
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "msg": "unsupported grant_type" }))),
    }
}

async fn user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match bearer(&headers) {
        Some("access-1" | "access-2") => (
            StatusCode::OK,
            Json(json!({ "id": USER_ID, "email": "ada@example.com", "role": "authenticated" })),
        ),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid JWT" }))),
    }
}

async fn signup(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["email"].as_str() {
        Some("taken@example.com") => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "code": 422, "msg": "User already registered" })))
        }
        Some("auto@example.com") => (StatusCode::OK, session_json("access-1", 3600)),
        _ => (
            StatusCode::OK,
            Json(json!({ "id": "0b5a3a51-7f8e-4f3c-8d1e-5a6b7c8d9e0f", "email": body["email"] })),
        ),
    }
}

async fn logout(State(api): State<MockIdentityApi>) -> StatusCode {
    api.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(api.logout_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn spawn_mock(api: MockIdentityApi) -> String {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/user", get(user))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(base_url: String) -> GoTrueClient {
    let config = IdentityConfig {
        base_url,
        anon_key: ANON_KEY.into(),
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
    };
    GoTrueClient::new(build_http_client(&config).unwrap(), &config)
}

fn expected_id() -> Uuid {
    Uuid::parse_str(USER_ID).unwrap()
}

// =============================================================================
// error_message
// =============================================================================

#[test]
fn error_message_prefers_error_description() {
    let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
    assert_eq!(error_message(body), "Invalid login credentials");
}

#[test]
fn error_message_falls_back_to_msg_then_message() {
    assert_eq!(error_message(r#"{"code":422,"msg":"User already registered"}"#), "User already registered");
    assert_eq!(error_message(r#"{"message":"No API key found"}"#), "No API key found");
}

#[test]
fn error_message_non_json_body_used_verbatim() {
    assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
}

#[test]
fn error_message_empty_body() {
    assert_eq!(error_message(""), "unknown error");
    assert_eq!(error_message(r#"{"msg":"  "}"#), r#"{"msg":"  "}"#);
}

// =============================================================================
// current_identity
// =============================================================================

#[tokio::test]
async fn no_session_returns_none_without_network() {
    // Nothing listens on port 1; a network call would fail with Transport.
    let client = client_for("http://127.0.0.1:1".into());
    assert_eq!(client.current_identity().await, Ok(None));
}

#[tokio::test]
async fn expired_token_refreshes_before_user_fetch() {
    let mut api = MockIdentityApi::new();
    api.expires_in = 0;
    let refreshes = api.refreshes.clone();
    let client = client_for(spawn_mock(api).await);
    let mut events = client.subscribe();

    client.sign_in_with_password("ada@example.com", "hunter22").await.unwrap();
    let identity = client.current_identity().await.unwrap().unwrap();

    assert_eq!(identity.id, expected_id());
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(events.try_recv(), Ok(AuthEvent::SignedIn));
    assert_eq!(events.try_recv(), Ok(AuthEvent::TokenRefreshed));
}

#[tokio::test]
async fn fresh_token_skips_refresh() {
    let api = MockIdentityApi::new();
    let refreshes = api.refreshes.clone();
    let client = client_for(spawn_mock(api).await);

    client.sign_in_with_password("ada@example.com", "hunter22").await.unwrap();
    client.current_identity().await.unwrap();
    client.current_identity().await.unwrap();

    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
}

// =============================================================================
// sign_in_with_password
// =============================================================================

#[tokio::test]
async fn sign_in_adopts_session_and_publishes() {
    let client = client_for(spawn_mock(MockIdentityApi::new()).await);
    let mut events = client.subscribe();

    client.sign_in_with_password("ada@example.com", "hunter22").await.unwrap();

    assert_eq!(events.try_recv(), Ok(AuthEvent::SignedIn));
    let identity = client.current_identity().await.unwrap().unwrap();
    assert_eq!(identity.id, expected_id());
    assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn sign_in_wrong_password_is_invalid_credentials() {
    let client = client_for(spawn_mock(MockIdentityApi::new()).await);
    let mut events = client.subscribe();

    let err = client.sign_in_with_password("ada@example.com", "nope").await.unwrap_err();

    assert_eq!(err, AuthenticationError::InvalidCredentials);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(client.current_identity().await, Ok(None));
}

#[tokio::test]
async fn sign_in_unreachable_service_is_transport_error() {
    let client = client_for("http://127.0.0.1:1".into());
    let err = client.sign_in_with_password("ada@example.com", "hunter22").await.unwrap_err();
    assert!(matches!(err, AuthenticationError::Transport(_)), "got {err:?}");
}

// =============================================================================
// sign_up
// =============================================================================

#[tokio::test]
async fn sign_up_duplicate_email_is_rejected() {
    let client = client_for(spawn_mock(MockIdentityApi::new()).await);
    let err = client.sign_up("taken@example.com", "hunter22").await.unwrap_err();
    assert_eq!(
        err,
        AuthenticationError::Rejected { status: 422, message: "User already registered".into() }
    );
}

#[tokio::test]
async fn sign_up_pending_confirmation_holds_no_session() {
    let client = client_for(spawn_mock(MockIdentityApi::new()).await);
    let mut events = client.subscribe();

    client.sign_up("new@example.com", "hunter22").await.unwrap();

    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(client.current_identity().await, Ok(None));
}

#[tokio::test]
async fn sign_up_auto_confirmed_adopts_session() {
    let client = client_for(spawn_mock(MockIdentityApi::new()).await);
    let mut events = client.subscribe();

    client.sign_up("auto@example.com", "hunter22").await.unwrap();

    assert_eq!(events.try_recv(), Ok(AuthEvent::SignedIn));
    assert!(client.current_identity().await.unwrap().is_some());
}

// =============================================================================
// sign_out
// =============================================================================

#[tokio::test]
async fn sign_out_calls_remote_and_publishes() {
    let api = MockIdentityApi::new();
    let logouts = api.logouts.clone();
    let client = client_for(spawn_mock(api).await);
    client.sign_in_with_password("ada@example.com", "hunter22").await.unwrap();
    let mut events = client.subscribe();

    client.sign_out().await.unwrap();

    assert_eq!(logouts.load(Ordering::SeqCst), 1);
    assert_eq!(events.try_recv(), Ok(AuthEvent::SignedOut));
    assert_eq!(client.current_identity().await, Ok(None));
}

#[tokio::test]
async fn sign_out_remote_failure_still_drops_session() {
    let mut api = MockIdentityApi::new();
    api.logout_status = 500;
    let client = client_for(spawn_mock(api).await);
    client.sign_in_with_password("ada@example.com", "hunter22").await.unwrap();
    let mut events = client.subscribe();

    let err = client.sign_out().await.unwrap_err();

    assert!(matches!(err, AuthenticationError::Rejected { status: 500, .. }), "got {err:?}");
    assert_eq!(events.try_recv(), Ok(AuthEvent::SignedOut));
    assert_eq!(client.current_identity().await, Ok(None));
}

#[tokio::test]
async fn sign_out_without_session_skips_remote() {
    let api = MockIdentityApi::new();
    let logouts = api.logouts.clone();
    let client = client_for(spawn_mock(api).await);

    client.sign_out().await.unwrap();

    assert_eq!(logouts.load(Ordering::SeqCst), 0);
}
