use super::*;
use crate::services::profile::Role;
use uuid::Uuid;

fn profile(role: Role) -> Profile {
    Profile { id: Uuid::from_u128(7), email: "grace@example.com".into(), role }
}

fn settled(user: Option<Profile>) -> SessionState {
    SessionState { user, loading: false }
}

// =============================================================================
// decide
// =============================================================================

#[test]
fn pending_while_loading_regardless_of_user() {
    for user in [None, Some(profile(Role::User)), Some(profile(Role::Admin))] {
        let state = SessionState { user, loading: true };
        assert_eq!(decide(&state, Access::SignedIn, "/quizzes"), GuardDecision::Pending);
        assert_eq!(decide(&state, Access::Admin, "/admin"), GuardDecision::Pending);
    }
}

#[test]
fn signed_out_redirects_to_login_with_location() {
    let decision = decide(&settled(None), Access::SignedIn, "/quizzes?section=3");
    assert_eq!(decision, GuardDecision::RedirectToLogin { from: "/quizzes?section=3".into() });
}

#[test]
fn signed_out_admin_route_goes_to_login_not_home() {
    let decision = decide(&settled(None), Access::Admin, "/admin");
    assert_eq!(decision, GuardDecision::RedirectToLogin { from: "/admin".into() });
}

#[test]
fn regular_user_on_admin_route_redirects_home() {
    let decision = decide(&settled(Some(profile(Role::User))), Access::Admin, "/admin");
    assert_eq!(decision, GuardDecision::RedirectHome);
}

#[test]
fn regular_user_allowed_on_signed_in_route() {
    let decision = decide(&settled(Some(profile(Role::User))), Access::SignedIn, "/quizzes");
    assert_eq!(decision, GuardDecision::Allow(profile(Role::User)));
}

#[test]
fn admin_allowed_everywhere() {
    let state = settled(Some(profile(Role::Admin)));
    assert_eq!(decide(&state, Access::Admin, "/admin"), GuardDecision::Allow(profile(Role::Admin)));
    assert_eq!(decide(&state, Access::SignedIn, "/quizzes"), GuardDecision::Allow(profile(Role::Admin)));
}

// =============================================================================
// login_location
// =============================================================================

#[test]
fn login_location_encodes_path_and_query() {
    assert_eq!(login_location("/admin?tab=quiz"), "/login?from=%2Fadmin%3Ftab%3Dquiz");
}

#[test]
fn login_location_root() {
    assert_eq!(login_location("/"), "/login?from=%2F");
}

#[test]
fn login_location_encodes_spaces_and_ampersands() {
    assert_eq!(login_location("/a b&c"), "/login?from=%2Fa+b%26c");
}
