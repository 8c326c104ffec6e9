use serde::{Deserialize, Serialize};

use crate::session::csrf::issue_csrf_token;
use crate::session::store::Session;

/// Opaque identifier of an authenticated user.
///
/// The User entity itself is owned by the data layer; the gating pipeline
/// only carries the pointer stored in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Explicit, typed per-request context.
///
/// Built exactly once per request by the session middleware and passed down
/// the call chain via request extensions — there is no global lookup, and
/// handlers never see a half-constructed context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The resolved (or freshly created anonymous) session.
    pub session: Session,
    /// Current user, if the session is authenticated.
    pub user_id: Option<UserId>,
    /// The client-facing CSRF token derived from this session's secret.
    pub csrf_token: String,
}

impl RequestContext {
    pub fn new(session: Session) -> Self {
        let csrf_token = issue_csrf_token(&session);
        let user_id = session.user_id.map(UserId);
        RequestContext {
            session,
            user_id,
            csrf_token,
        }
    }
}
