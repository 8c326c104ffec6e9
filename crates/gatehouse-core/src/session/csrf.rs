use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::session::store::Session;

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh CSRF secret (32 random bytes, hex-encoded).
///
/// Bound to a session at creation time and regenerated together with the
/// session id on every privilege change, so a pre-login token can never
/// remain valid post-login.
pub fn generate_csrf_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Derive the client-facing CSRF token for a session.
///
/// Token = HMAC-SHA256(key = session CSRF secret, message = session id).
/// Deterministic per session, so the same session always yields a verifiable
/// token, while the raw secret itself never leaves the server.
pub fn issue_csrf_token(session: &Session) -> String {
    let mut mac = HmacSha256::new_from_slice(session.csrf_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(session.id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a CSRF token from the request against the session-derived token.
pub fn verify_csrf_token(expected: &str, request_token: &str) -> bool {
    constant_time_eq(expected, request_token)
}

/// Constant-time comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
