//! Per-browser session state: who is signed in and what they may do.
//!
//! ARCHITECTURE
//! ============
//! `SessionStore` owns one `SessionState` in a `watch` cell. Only the store's
//! methods and its identity-event listener write to it; everything else reads
//! snapshots or subscribes to changes. The store is an ordinary value, so each
//! browser session (and each test) gets an isolated instance.
//!
//! CONCURRENCY
//! ===========
//! Loads and sign-outs may interleave at network boundaries. A monotonic
//! generation counter orders them: every `load()` and every sign-out takes a
//! ticket. `settled` records the newest ticket reflected in the state. A load
//! applies its user only if its ticket is newer than `settled`, so an older
//! load never overwrites a newer one and never resurrects a signed-out user.
//! A load overtaken by a newer load that has not finished yet still applies,
//! so `load()` always returns with a state at least as fresh as its own
//! start. A load always clears `loading`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::DataAccessError;
use crate::identity::{AuthEvent, AuthenticationError, IdentityService};
use crate::services::profile::{Profile, ProfileStore, Role};

// =============================================================================
// SESSION STATE
// =============================================================================

/// Snapshot of one browser's auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<Profile>,
    /// True until the first load attempt completes.
    pub loading: bool,
}

impl SessionState {
    /// State of a freshly created store.
    #[must_use]
    pub fn initial() -> Self {
        Self { user: None, loading: true }
    }

    /// Settled state with nobody signed in.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { user: None, loading: false }
    }

    /// Derived from the user's role; never stored.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == Role::Admin)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Identity(#[from] AuthenticationError),
    #[error(transparent)]
    Data(#[from] DataAccessError),
}

// =============================================================================
// SESSION STORE
// =============================================================================

pub struct SessionStore {
    identity: Arc<dyn IdentityService>,
    profiles: Arc<dyn ProfileStore>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    /// Newest ticket whose outcome is reflected in `state`.
    settled: AtomicU64,
}

impl SessionStore {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self { identity, profiles, state, generation: AtomicU64::new(0), settled: AtomicU64::new(0) }
    }

    /// Create a store and start its identity-event listener.
    #[must_use]
    pub fn spawn(identity: Arc<dyn IdentityService>, profiles: Arc<dyn ProfileStore>) -> Arc<Self> {
        let store = Arc::new(Self::new(identity, profiles));
        let _listener = store.spawn_event_listener();
        store
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve the current identity and its profile, replacing the state.
    ///
    /// Failures degrade to signed-out; `loading` is always false afterwards.
    pub async fn load(&self) {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let user = match self.resolve_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "session load failed; treating as signed out");
                None
            }
        };

        self.state.send_modify(|state| {
            if ticket > self.settled.load(Ordering::SeqCst) {
                state.user = user;
                self.settled.store(ticket, Ordering::SeqCst);
            } else {
                debug!(ticket, "discarding stale session load");
            }
            state.loading = false;
        });
    }

    async fn resolve_user(&self) -> Result<Option<Profile>, LoadError> {
        let Some(identity) = self.identity.current_identity().await? else {
            return Ok(None);
        };
        let profile = self.profiles.fetch_profile(identity.id).await?;
        Ok(Some(profile))
    }

    /// Authenticate, then reload so the returned state reflects the new profile.
    ///
    /// # Errors
    ///
    /// Returns the identity service's rejection; state is untouched on error.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthenticationError> {
        require_credentials(email, password)?;
        self.identity
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| warn!(error = %e, "sign-in rejected"))?;
        self.load().await;
        info!(is_admin = self.state.borrow().is_admin(), "signed in");
        Ok(())
    }

    /// Create an account. Never populates the session itself.
    ///
    /// # Errors
    ///
    /// Returns the identity service's rejection (duplicate email, weak password).
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthenticationError> {
        require_credentials(email, password)?;
        self.identity
            .sign_up(email, password)
            .await
            .inspect_err(|e| warn!(error = %e, "sign-up rejected"))
    }

    /// End the remote session and clear local state.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, if any. Local state is cleared either way.
    pub async fn sign_out(&self) -> Result<(), AuthenticationError> {
        let remote = self.identity.sign_out().await;
        self.clear();
        if let Err(e) = &remote {
            warn!(error = %e, "remote sign-out failed; local session cleared");
        }
        remote
    }

    fn clear(&self) {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.user = None;
            self.settled.fetch_max(ticket, Ordering::SeqCst);
        });
    }

    /// Follow identity events for as long as this store is alive.
    fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.identity.subscribe();
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = events.recv().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                match event {
                    Ok(AuthEvent::SignedIn | AuthEvent::TokenRefreshed) => store.load().await,
                    Ok(AuthEvent::SignedOut) => store.clear(),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "identity events lagged; reloading session");
                        store.load().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn require_credentials(email: &str, password: &str) -> Result<(), AuthenticationError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthenticationError::MissingCredentials);
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
