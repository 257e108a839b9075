//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the auth, session and admin endpoints under a single
//! Axum router. Protected handlers take a guard extractor, so access rules
//! live in the handler signature rather than in per-route middleware.

pub mod admin;
pub mod auth;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/me", get(auth::me))
        .route(
            "/api/admin/quiz-sections",
            get(admin::list_quiz_sections).post(admin::create_quiz_section),
        )
        .route("/api/admin/quiz-sections/{id}", delete(admin::delete_quiz_section))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
