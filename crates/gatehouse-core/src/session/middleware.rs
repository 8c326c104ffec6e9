//! The request-gating middleware pipeline.
//!
//! Two layers, applied in strict order per request:
//!
//! 1. [`resolve_session`] — resolves the session cookie, loads (or creates)
//!    the session, and builds the per-request [`RequestContext`].
//! 2. [`csrf_protect`] — gates mutating requests behind a matching CSRF
//!    token check.
//!
//! In axum terms the session layer must be the *outer* layer:
//!
//! ```rust,ignore
//! router
//!     .layer(middleware::from_fn_with_state(state.clone(), csrf_protect))
//!     .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
//! ```

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, ORIGIN, REFERER, SET_COOKIE};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app::AppState;
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::GateError;
use crate::session::csrf::{constant_time_eq, issue_csrf_token, verify_csrf_token};
use crate::session::store::Session;

/// Request/response header carrying the CSRF token.
pub const CSRF_HEADER: &str = "csrf-token";

/// Form field carrying the CSRF token on server-rendered forms.
pub const CSRF_FORM_FIELD: &str = "csrf";

/// Upper bound on the form body buffered while peeking for the CSRF field.
const FORM_BUFFER_LIMIT: usize = 1024 * 1024;

type HmacSha256 = Hmac<Sha256>;

// ── Session resolution ──

/// Resolve the session for an incoming request.
///
/// Looks up the signed session cookie, loads the record, and creates a fresh
/// anonymous session when the cookie is absent, forged, or points at an
/// expired/destroyed session. A store failure fails the request — it never
/// degrades to anonymous, since that would let an attacker shed CSRF
/// protection by forcing store errors.
///
/// On a freshly created session the response carries the `Set-Cookie` header
/// and the derived CSRF token in the `CSRF-Token` response header (the one
/// place the token is handed to the client).
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, GateError> {
    let config = &state.config;

    let cookie_id = jar
        .get(&config.session_cookie)
        .and_then(|cookie| parse_signed_value(&config.session_secret, cookie.value()));

    let (session, fresh) = match cookie_id {
        Some(id) => match state.sessions.load(&id).await? {
            Some(session) => (session, false),
            None => (state.sessions.create_anonymous().await?, true),
        },
        None => (state.sessions.create_anonymous().await?, true),
    };

    let ctx = RequestContext::new(session);
    let csrf_token = ctx.csrf_token.clone();
    let session_for_cookie = ctx.session.clone();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;

    if fresh {
        let cookie = build_session_cookie(config, &session_for_cookie);
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| GateError::Internal(format!("invalid session cookie: {e}")))?;
        response.headers_mut().append(SET_COOKIE, value);

        if let Ok(token) = HeaderValue::from_str(&csrf_token) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(CSRF_HEADER), token);
        }
    }

    Ok(response)
}

/// Build the session cookie for a session: HTTP-only, `SameSite=Lax`,
/// `Secure` in production, carrying only the signed opaque id.
pub fn build_session_cookie(config: &Config, session: &Session) -> Cookie<'static> {
    Cookie::build((
        config.session_cookie.clone(),
        sign_session_id(&config.session_secret, &session.id),
    ))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .secure(config.is_production())
    .build()
}

fn sign_session_id(secret: &str, id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(id.as_bytes());
    format!("{id}.{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signed cookie value, returning the session id. Tampered or
/// malformed values read as "no cookie".
fn parse_signed_value(secret: &str, raw: &str) -> Option<String> {
    let (id, _sig) = raw.split_once('.')?;
    if id.is_empty() {
        return None;
    }
    let expected = sign_session_id(secret, id);
    if constant_time_eq(&expected, raw) {
        Some(id.to_string())
    } else {
        None
    }
}

// ── CSRF validation ──

/// Gate mutating requests behind a session-bound CSRF token check.
///
/// The token is taken from the `CSRF-Token` header or, for form-encoded
/// bodies, the `csrf` field. Peeking at the body buffers it once and
/// reassembles the request, so the downstream handler still consumes the
/// original body exactly once.
///
/// Fails closed: missing token, missing session secret, or mismatch all
/// reject with 422 and a machine-readable code.
pub async fn csrf_protect(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, GateError> {
    if !is_mutating(req.method()) {
        return Ok(next.run(req).await);
    }

    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .ok_or_else(|| GateError::Internal("session middleware not installed".to_string()))?;

    if playground_bypass(&state.config, req.uri().path(), req.headers()) {
        tracing::debug!(path = %req.uri().path(), "csrf check bypassed for playground origin");
        return Ok(next.run(req).await);
    }

    let (req, supplied) = extract_token(req).await?;
    let supplied = supplied.ok_or(GateError::CsrfTokenMissing)?;

    if ctx.session.csrf_secret.is_empty() {
        return Err(GateError::CsrfTokenMismatch);
    }

    let expected = issue_csrf_token(&ctx.session);
    if !verify_csrf_token(&expected, &supplied) {
        return Err(GateError::CsrfTokenMismatch);
    }

    Ok(next.run(req).await)
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Development-only allowlist: the GraphQL playground posts from our own
/// origin without a token. Covers the `/graphql` route and nothing else,
/// and requires the explicit config flag *and* a non-production environment
/// *and* an exact `Origin`/`Referer` match against `ROOT_URL` — an Origin
/// match alone bypasses nothing.
fn playground_bypass(config: &Config, path: &str, headers: &HeaderMap) -> bool {
    if path != "/graphql" {
        return false;
    }
    if !config.enable_playground_bypass || config.is_production() {
        return false;
    }
    matches_root_url(headers, &config.root_url)
}

fn matches_root_url(headers: &HeaderMap, root_url: &str) -> bool {
    let root = root_url.trim_end_matches('/');
    if let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) {
        return origin.trim_end_matches('/') == root;
    }
    if let Some(referer) = headers.get(REFERER).and_then(|v| v.to_str().ok()) {
        return referer == root || referer.starts_with(&format!("{root}/"));
    }
    false
}

/// Pull the CSRF token out of the request, buffering the body only when the
/// token has to come from a form field. Returns the request with its body
/// intact for the downstream handler.
async fn extract_token(req: Request) -> Result<(Request, Option<String>), GateError> {
    if let Some(token) = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
    {
        return Ok((req, Some(token)));
    }

    if !is_form_encoded(req.headers()) {
        return Ok((req, None));
    }

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, FORM_BUFFER_LIMIT)
        .await
        .map_err(|e| GateError::BadRequest(format!("unreadable request body: {e}")))?;
    let token = form_csrf_token(&bytes);
    let req = Request::from_parts(parts, Body::from(bytes));
    Ok((req, token))
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn form_csrf_token(bytes: &[u8]) -> Option<String> {
    let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).ok()?;
    fields
        .into_iter()
        .find(|(name, _)| name == CSRF_FORM_FIELD)
        .map(|(_, value)| value)
}
