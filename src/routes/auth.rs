//! Auth routes: sign-in/up/out, session snapshot, and route guard extractors.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each browser carries an opaque `session_id` cookie naming its
//! `SessionStore` in the registry. Identity tokens never leave the server;
//! the browser only ever sees the session snapshot.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::identity::AuthenticationError;
use crate::services::guard::{Access, GuardDecision, HOME_PATH, decide, login_location};
use crate::services::profile::Profile;
use crate::services::session::{SessionState, SessionStore};
use crate::state::{AppState, generate_session_id};

pub(crate) const COOKIE_NAME: &str = "session_id";

#[derive(Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Session snapshot as the browser sees it.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SessionView {
    pub user: Option<Profile>,
    pub loading: bool,
    pub is_admin: bool,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        Self { user: state.user.clone(), loading: state.loading, is_admin: state.is_admin() }
    }
}

fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

/// The registered store named by the request's session cookie, if any.
pub(crate) async fn store_for(state: &AppState, jar: &CookieJar) -> Option<(String, Arc<SessionStore>)> {
    let id = jar.get(COOKIE_NAME).map(Cookie::value).filter(|v| !v.is_empty())?;
    let store = state.sessions.get(id).await?;
    Some((id.to_owned(), store))
}

pub(crate) fn auth_error_to_status(err: &AuthenticationError) -> StatusCode {
    match err {
        AuthenticationError::MissingCredentials => StatusCode::BAD_REQUEST,
        AuthenticationError::Transport(_) => StatusCode::BAD_GATEWAY,
        AuthenticationError::InvalidCredentials
        | AuthenticationError::Rejected { .. }
        | AuthenticationError::Malformed(_) => StatusCode::UNAUTHORIZED,
    }
}

fn auth_error_response(err: &AuthenticationError) -> Response {
    let status = auth_error_to_status(err);
    let message = match status {
        StatusCode::UNAUTHORIZED => "authentication failed".to_owned(),
        _ => err.to_string(),
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// =============================================================================
// GUARD EXTRACTORS
// =============================================================================

/// Profile of a signed-in user. Rejects with the rendered guard decision.
pub struct RequireSignedIn(pub Profile);

/// Profile of a signed-in admin. Rejects with the rendered guard decision.
pub struct RequireAdmin(pub Profile);

impl<S> FromRequestParts<S> for RequireSignedIn
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guard(parts, &AppState::from_ref(state), Access::SignedIn).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        guard(parts, &AppState::from_ref(state), Access::Admin).await.map(Self)
    }
}

pub(crate) async fn guard(parts: &Parts, state: &AppState, access: Access) -> Result<Profile, Response> {
    let jar = CookieJar::from_headers(&parts.headers);
    let snapshot = match store_for(state, &jar).await {
        Some((_, store)) => store.state(),
        None => SessionState::signed_out(),
    };
    match decide(&snapshot, access, &request_location(&parts.uri)) {
        GuardDecision::Allow(profile) => Ok(profile),
        decision => {
            tracing::debug!(?access, ?decision, "route guard rejected request");
            Err(render_decision(decision))
        }
    }
}

/// Original path and query, used as the post-login return location.
pub(crate) fn request_location(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned())
}

pub(crate) fn render_decision(decision: GuardDecision) -> Response {
    match decision {
        GuardDecision::Pending => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(serde_json::json!({ "status": "pending" })),
        )
            .into_response(),
        GuardDecision::RedirectToLogin { from } => Redirect::to(&login_location(&from)).into_response(),
        GuardDecision::RedirectHome => Redirect::to(HOME_PATH).into_response(),
        GuardDecision::Allow(profile) => Json(profile).into_response(),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/signin`: authenticate, register the store, set cookie.
pub async fn signin(State(state): State<AppState>, jar: CookieJar, Json(body): Json<CredentialsBody>) -> Response {
    let (id, store) = match store_for(&state, &jar).await {
        Some(existing) => existing,
        None => (generate_session_id(), state.new_session_store()),
    };

    if let Err(e) = store.sign_in(&body.email, &body.password).await {
        return auth_error_response(&e);
    }

    let view = SessionView::from(&store.state());
    state.sessions.insert(id.clone(), store).await;
    let jar = jar.add(session_cookie(id, state.cookie_secure));
    (jar, Json(view)).into_response()
}

/// `POST /api/auth/signup`: create an account. Does not sign the browser in.
pub async fn signup(State(state): State<AppState>, jar: CookieJar, Json(body): Json<CredentialsBody>) -> Response {
    let store = match store_for(&state, &jar).await {
        Some((_, store)) => store,
        None => state.new_session_store(),
    };

    match store.sign_up(&body.email, &body.password).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))).into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// `POST /api/auth/signout`: end the session, drop the store, clear cookie.
pub async fn signout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let remote = match store_for(&state, &jar).await {
        Some((id, store)) => {
            let result = store.sign_out().await;
            state.sessions.remove(&id).await;
            result
        }
        None => Ok(()),
    };

    let jar = jar.add(expired_session_cookie(state.cookie_secure));
    match remote {
        Ok(()) => (jar, StatusCode::NO_CONTENT).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, jar, Json(serde_json::json!({ "error": e.to_string() }))).into_response(),
    }
}

/// `GET /api/auth/session`: current snapshot; signed out when no store.
pub async fn session(State(state): State<AppState>, jar: CookieJar) -> Json<SessionView> {
    let snapshot = match store_for(&state, &jar).await {
        Some((_, store)) => store.state(),
        None => SessionState::signed_out(),
    };
    Json(SessionView::from(&snapshot))
}

/// `POST /api/auth/refresh`: re-resolve identity and profile.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Json<SessionView> {
    let snapshot = match store_for(&state, &jar).await {
        Some((_, store)) => {
            store.load().await;
            store.state()
        }
        None => SessionState::signed_out(),
    };
    Json(SessionView::from(&snapshot))
}

/// `GET /api/me`: profile of the signed-in user.
pub async fn me(RequireSignedIn(profile): RequireSignedIn) -> Json<Profile> {
    Json(profile)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
