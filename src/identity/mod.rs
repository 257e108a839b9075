//! Identity service boundary.
//!
//! SYSTEM CONTEXT
//! ==============
//! The hosted identity service checks credentials and owns access tokens.
//! `SessionStore` reaches it only through [`IdentityService`], so tests can
//! swap in an in-memory double. Each implementation publishes auth state
//! changes on a broadcast channel for the lifetime of the session.

pub mod gotrue;

use tokio::sync::broadcast;
use uuid::Uuid;

/// Authenticated principal as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Auth state notifications pushed by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// Any rejection or failure from the identity service.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("email and password are required")]
    MissingCredentials,
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("identity service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("identity service unreachable: {0}")]
    Transport(String),
    #[error("unexpected identity service response: {0}")]
    Malformed(String),
}

#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// The identity behind the currently held session, or `None` when signed out.
    async fn current_identity(&self) -> Result<Option<Identity>, AuthenticationError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AuthenticationError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthenticationError>;

    /// Terminate the session remotely. Local tokens are dropped even on error.
    async fn sign_out(&self) -> Result<(), AuthenticationError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
