//! GoTrue-compatible REST client for the hosted identity service.
//!
//! DESIGN
//! ======
//! One `GoTrueClient` per browser session: it holds that session's token pair
//! and its own event channel. The `reqwest::Client` underneath is shared so all
//! sessions reuse one connection pool.
//!
//! TRADE-OFFS
//! ==========
//! Tokens live only in memory. A server restart signs every browser out, which
//! is acceptable because the hosted service remains the source of truth and a
//! fresh password grant restores the session.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AuthEvent, AuthenticationError, Identity, IdentityService};
use crate::config::IdentityConfig;

const EVENT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
/// Refresh the access token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Build the shared HTTP client used by every per-session identity client.
///
/// # Errors
///
/// Returns an error if the TLS backend fails to initialize.
pub fn build_http_client(config: &IdentityConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent("compilerlab")
        .build()
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// Sign-up returns a full session when the project auto-confirms accounts,
/// otherwise just the pending user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(SessionResponse),
    User(UserResponse),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Extract a human-readable message from an identity service error body.
pub(crate) fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() { "unknown error".to_owned() } else { trimmed.to_owned() }
        })
}

#[derive(Debug, Clone)]
struct TokenSet {
    access_token: String,
    refresh_token: String,
    expires_at: OffsetDateTime,
}

impl TokenSet {
    fn from_response(session: &SessionResponse, now: OffsetDateTime) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: now + time::Duration::seconds(session.expires_in),
        }
    }

    fn expires_soon(&self, now: OffsetDateTime) -> bool {
        self.expires_at - now <= time::Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: Client,
    auth_url: String,
    anon_key: String,
    tokens: Mutex<Option<TokenSet>>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueClient {
    #[must_use]
    pub fn new(http: Client, config: &IdentityConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            auth_url: format!("{}/auth/v1", config.base_url),
            anon_key: config.anon_key.clone(),
            tokens: Mutex::new(None),
            events,
        }
    }

    /// Exchange the held refresh token for a new token pair.
    ///
    /// A rejected refresh drops the session and publishes `SignedOut`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or rejects the token.
    pub async fn refresh_session(&self) -> Result<(), AuthenticationError> {
        let refresh_token = self
            .tokens
            .lock()
            .await
            .as_ref()
            .map(|t| t.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };

        let resp = self
            .post_json("/token?grant_type=refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        if !resp.status().is_success() {
            let err = rejection(resp).await;
            warn!(error = %err, "token refresh rejected; dropping session");
            *self.tokens.lock().await = None;
            self.publish(AuthEvent::SignedOut);
            return Err(err);
        }

        let session: SessionResponse = resp.json().await.map_err(malformed)?;
        self.adopt(&session).await;
        debug!("access token refreshed");
        self.publish(AuthEvent::TokenRefreshed);
        Ok(())
    }

    fn publish(&self, event: AuthEvent) {
        // Send only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }

    async fn adopt(&self, session: &SessionResponse) {
        *self.tokens.lock().await = Some(TokenSet::from_response(session, OffsetDateTime::now_utc()));
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<Response, AuthenticationError> {
        self.http
            .post(format!("{}{path}", self.auth_url))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)
    }

    async fn fresh_access_token(&self) -> Result<Option<String>, AuthenticationError> {
        {
            let tokens = self.tokens.lock().await;
            match tokens.as_ref() {
                None => return Ok(None),
                Some(t) if !t.expires_soon(OffsetDateTime::now_utc()) => return Ok(Some(t.access_token.clone())),
                Some(_) => {}
            }
        }

        self.refresh_session().await?;
        Ok(self
            .tokens
            .lock()
            .await
            .as_ref()
            .map(|t| t.access_token.clone()))
    }
}

#[async_trait::async_trait]
impl IdentityService for GoTrueClient {
    async fn current_identity(&self) -> Result<Option<Identity>, AuthenticationError> {
        let Some(access_token) = self.fresh_access_token().await? else {
            return Ok(None);
        };

        let resp = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        let user: UserResponse = resp.json().await.map_err(malformed)?;
        Ok(Some(Identity { id: user.id, email: user.email }))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AuthenticationError> {
        let resp = self
            .post_json("/token?grant_type=password", json!({ "email": email, "password": password }))
            .await?;
        match resp.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => return Err(AuthenticationError::InvalidCredentials),
            _ => return Err(rejection(resp).await),
        }

        let session: SessionResponse = resp.json().await.map_err(malformed)?;
        self.adopt(&session).await;
        self.publish(AuthEvent::SignedIn);
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthenticationError> {
        let resp = self
            .post_json("/signup", json!({ "email": email, "password": password }))
            .await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        match resp.json::<SignUpResponse>().await.map_err(malformed)? {
            SignUpResponse::Session(session) => {
                self.adopt(&session).await;
                self.publish(AuthEvent::SignedIn);
            }
            SignUpResponse::User(user) => debug!(user_id = %user.id, "sign-up awaiting confirmation"),
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthenticationError> {
        let held = self.tokens.lock().await.take();
        let result = match held {
            None => Ok(()),
            Some(tokens) => {
                match self
                    .http
                    .post(format!("{}/logout", self.auth_url))
                    .header("apikey", &self.anon_key)
                    .bearer_auth(&tokens.access_token)
                    .send()
                    .await
                {
                    Ok(resp) if resp.status().is_success() => Ok(()),
                    Ok(resp) => Err(rejection(resp).await),
                    Err(e) => Err(transport(e)),
                }
            }
        };
        self.publish(AuthEvent::SignedOut);
        result
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn transport(err: reqwest::Error) -> AuthenticationError {
    AuthenticationError::Transport(err.to_string())
}

fn malformed(err: reqwest::Error) -> AuthenticationError {
    AuthenticationError::Malformed(err.to_string())
}

async fn rejection(resp: Response) -> AuthenticationError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    AuthenticationError::Rejected { status, message: error_message(&body) }
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
