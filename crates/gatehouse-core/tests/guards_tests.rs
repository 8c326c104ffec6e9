use chrono::{Duration, Utc};
use gatehouse_core::session::guards::{
    is_safe_next, login_redirect_target, require_no_user, require_user, resolve_current_user,
};
use gatehouse_core::session::store::{generate_session_id, Session};
use gatehouse_core::{GateError, RequestContext, UserId};

fn context(user_id: Option<i64>) -> RequestContext {
    let now = Utc::now().naive_utc();
    RequestContext::new(Session {
        id: generate_session_id(),
        user_id,
        csrf_secret: "abc123".to_string(),
        created_at: now,
        expires_at: now + Duration::hours(24),
    })
}

#[test]
fn test_is_safe_next_accepts_relative_paths() {
    assert!(is_safe_next("/"));
    assert!(is_safe_next("/settings"));
    assert!(is_safe_next("/a/b?c=d"));
}

#[test]
fn test_is_safe_next_rejects_open_redirect_vectors() {
    assert!(!is_safe_next(""));
    assert!(!is_safe_next("//evil.example/path"));
    assert!(!is_safe_next("/\\evil.example"));
    assert!(!is_safe_next("https://evil.example/"));
    assert!(!is_safe_next("javascript:alert(1)"));
    assert!(!is_safe_next("settings"));
}

#[test]
fn test_login_redirect_target_percent_encodes_next() {
    assert_eq!(login_redirect_target("/settings"), "/login?next=%2Fsettings");
}

#[test]
fn test_login_redirect_target_clamps_unsafe_next() {
    assert_eq!(
        login_redirect_target("//evil.example/x"),
        "/login?next=%2F"
    );
}

#[test]
fn test_resolve_current_user() {
    assert_eq!(resolve_current_user(&context(Some(7)).session), Some(UserId(7)));
    assert_eq!(resolve_current_user(&context(None).session), None);
}

#[test]
fn test_require_user_passes_for_authenticated() {
    let ctx = context(Some(42));
    assert_eq!(require_user(&ctx, "/settings").unwrap(), UserId(42));
}

#[test]
fn test_require_user_fails_with_next_for_anonymous() {
    let ctx = context(None);
    match require_user(&ctx, "/settings") {
        Err(GateError::Unauthenticated { next }) => assert_eq!(next, "/settings"),
        other => panic!("expected Unauthenticated, got {other:?}"),
    }
}

#[test]
fn test_require_user_sanitizes_unsafe_next() {
    let ctx = context(None);
    match require_user(&ctx, "//evil.example") {
        Err(GateError::Unauthenticated { next }) => assert_eq!(next, "/"),
        other => panic!("expected Unauthenticated, got {other:?}"),
    }
}

#[test]
fn test_require_no_user() {
    assert!(require_no_user(&context(None)).is_ok());
    assert!(matches!(
        require_no_user(&context(Some(1))),
        Err(GateError::AlreadyAuthenticated)
    ));
}
