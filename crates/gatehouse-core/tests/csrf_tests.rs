use chrono::{Duration, Utc};
use gatehouse_core::session::csrf::{generate_csrf_secret, issue_csrf_token, verify_csrf_token};
use gatehouse_core::session::store::{generate_session_id, Session};

fn session_with_secret(secret: &str) -> Session {
    let now = Utc::now().naive_utc();
    Session {
        id: generate_session_id(),
        user_id: None,
        csrf_secret: secret.to_string(),
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}

#[test]
fn test_round_trip_always_verifies() {
    let session = session_with_secret(&generate_csrf_secret());
    let token = issue_csrf_token(&session);
    assert!(verify_csrf_token(&issue_csrf_token(&session), &token));
}

#[test]
fn test_token_is_deterministic_per_session() {
    let session = session_with_secret("abc123");
    assert_eq!(issue_csrf_token(&session), issue_csrf_token(&session));
}

#[test]
fn test_token_never_exposes_the_secret() {
    let session = session_with_secret("abc123");
    let token = issue_csrf_token(&session);
    assert!(!token.contains("abc123"));
}

#[test]
fn test_wrong_token_fails() {
    let session = session_with_secret("abc123");
    let expected = issue_csrf_token(&session);
    assert!(!verify_csrf_token(&expected, "wrong"));
}

#[test]
fn test_cross_session_token_fails() {
    let a = session_with_secret(&generate_csrf_secret());
    let b = session_with_secret(&generate_csrf_secret());

    let token_for_b = issue_csrf_token(&b);
    assert!(!verify_csrf_token(&issue_csrf_token(&a), &token_for_b));
}

#[test]
fn test_same_secret_different_session_id_fails() {
    // The token binds the id too, not just the secret.
    let a = session_with_secret("abc123");
    let mut b = a.clone();
    b.id = generate_session_id();

    assert!(!verify_csrf_token(&issue_csrf_token(&a), &issue_csrf_token(&b)));
}

#[test]
fn test_equal_length_but_different_fails() {
    let session = session_with_secret("abc123");
    let expected = issue_csrf_token(&session);
    let mut forged = expected.clone().into_bytes();
    forged[0] = if forged[0] == b'0' { b'1' } else { b'0' };
    let forged = String::from_utf8(forged).unwrap();

    assert!(!verify_csrf_token(&expected, &forged));
}

#[test]
fn test_fresh_secrets_are_unique() {
    assert_ne!(generate_csrf_secret(), generate_csrf_secret());
    assert_ne!(generate_session_id(), generate_session_id());
}
