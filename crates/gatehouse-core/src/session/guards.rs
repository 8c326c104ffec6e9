//! Authentication guards for route handlers.
//!
//! `require_user` and `require_no_user` fail with redirect-style errors: an
//! anonymous request to a protected route is sent to
//! `/login?next=<original path>`, an authenticated request to a
//! visitors-only route (login, registration) is sent home.

use crate::context::{RequestContext, UserId};
use crate::error::GateError;
use crate::session::store::Session;

/// Resolve the current user for a session, if any.
pub fn resolve_current_user(session: &Session) -> Option<UserId> {
    session.user_id.map(UserId)
}

/// Require an authenticated user.
///
/// `original_path` is the path (and query) the client asked for; it is
/// carried through the login redirect so navigation intent survives.
pub fn require_user(ctx: &RequestContext, original_path: &str) -> Result<UserId, GateError> {
    ctx.user_id.ok_or_else(|| GateError::Unauthenticated {
        next: safe_next(original_path).to_string(),
    })
}

/// Require an anonymous session. Used to keep authenticated users off
/// login/registration pages.
pub fn require_no_user(ctx: &RequestContext) -> Result<(), GateError> {
    if ctx.user_id.is_some() {
        return Err(GateError::AlreadyAuthenticated);
    }
    Ok(())
}

/// Is `path` a safe same-origin redirect target?
///
/// True only for strings beginning with exactly one `/`. Rejects the empty
/// string, protocol-relative `//host/path` (an open-redirect vector),
/// absolute URLs with a scheme, and `/\` which browsers normalize to `//`.
pub fn is_safe_next(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/') && !matches!(chars.next(), Some('/') | Some('\\'))
}

/// Clamp a `next` parameter to a safe same-origin path, falling back to `/`.
pub fn safe_next(path: &str) -> &str {
    if is_safe_next(path) { path } else { "/" }
}

/// Build the login redirect target for an unauthenticated request,
/// percent-encoding the original path into the `next` parameter.
pub fn login_redirect_target(next: &str) -> String {
    let query = serde_urlencoded::to_string([("next", safe_next(next))]).unwrap_or_default();
    format!("/login?{query}")
}
