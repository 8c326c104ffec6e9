pub mod csrf;
pub mod db_store;
pub mod guards;
pub mod middleware;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

pub use csrf::{generate_csrf_secret, issue_csrf_token, verify_csrf_token};
pub use guards::{is_safe_next, require_no_user, require_user, resolve_current_user};
pub use middleware::{build_session_cookie, csrf_protect, resolve_session, CSRF_HEADER};
pub use store::{InMemoryStore, Session, SessionService, SessionStore};
