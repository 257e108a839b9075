//! Route guard decisions over a session snapshot.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected routes either need any signed-in user or an admin. The decision
//! is a pure function of the snapshot so the HTTP layer only has to render it.

use crate::services::profile::Profile;
use crate::services::session::SessionState;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    SignedIn,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// First load still in flight; no redirect decision yet.
    Pending,
    /// Nobody signed in. `from` is the originally requested location.
    RedirectToLogin { from: String },
    /// Signed in, but not an admin.
    RedirectHome,
    Allow(Profile),
}

#[must_use]
pub fn decide(state: &SessionState, access: Access, location: &str) -> GuardDecision {
    if state.loading {
        return GuardDecision::Pending;
    }
    let Some(user) = &state.user else {
        return GuardDecision::RedirectToLogin { from: location.to_owned() };
    };
    if access == Access::Admin && !state.is_admin() {
        return GuardDecision::RedirectHome;
    }
    GuardDecision::Allow(user.clone())
}

/// Sign-in entry point carrying the return location as `?from=`.
#[must_use]
pub fn login_location(from: &str) -> String {
    reqwest::Url::parse_with_params("http://localhost/login", &[("from", from)])
        .ok()
        .and_then(|url| url.query().map(|query| format!("{LOGIN_PATH}?{query}")))
        .unwrap_or_else(|| LOGIN_PATH.to_owned())
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
