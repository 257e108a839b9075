//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the database pool, the profile store, a factory for per-browser
//! identity clients, and the registry mapping session cookies to their
//! `SessionStore`.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::identity::IdentityService;
use crate::services::profile::ProfileStore;
use crate::services::session::SessionStore;

/// Builds a fresh identity client for a new browser session.
pub type IdentityFactory = Arc<dyn Fn() -> Arc<dyn IdentityService> + Send + Sync>;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex session id.
#[must_use]
pub fn generate_session_id() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// SESSION REGISTRY
// =============================================================================

struct SessionEntry {
    store: Arc<SessionStore>,
    last_seen: Instant,
}

/// Browser session id -> live `SessionStore`.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    /// Look up a store and mark it as recently used.
    pub async fn get(&self, id: &str) -> Option<Arc<SessionStore>> {
        let mut sessions = self.inner.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.store.clone())
    }

    pub async fn insert(&self, id: String, store: Arc<SessionStore>) {
        let mut sessions = self.inner.write().await;
        sessions.insert(id, SessionEntry { store, last_seen: Instant::now() });
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<SessionStore>> {
        self.inner.write().await.remove(id).map(|entry| entry.store)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop sessions idle for at least `ttl`. Returns how many were evicted.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - sessions.len()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub profiles: Arc<dyn ProfileStore>,
    pub identity_factory: IdentityFactory,
    pub sessions: SessionRegistry,
    pub cookie_secure: bool,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        profiles: Arc<dyn ProfileStore>,
        identity_factory: IdentityFactory,
        cookie_secure: bool,
    ) -> Self {
        Self { pool, profiles, identity_factory, sessions: SessionRegistry::default(), cookie_secure }
    }

    /// New store for a browser that has no session yet. Not registered.
    #[must_use]
    pub fn new_session_store(&self) -> Arc<SessionStore> {
        SessionStore::spawn((self.identity_factory)(), self.profiles.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
