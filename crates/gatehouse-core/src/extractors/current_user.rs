use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::context::{RequestContext, UserId};
use crate::error::GateError;
use crate::session::guards;

/// Extractor that requires an authenticated user.
///
/// Anonymous requests are redirected to the login page with the originally
/// requested path in `next`.
///
/// Usage in handlers:
/// ```rust,ignore
/// async fn settings(CurrentUser(user_id): CurrentUser) -> impl IntoResponse {
///     // user_id is the authenticated user's id
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = request_context(parts)?;
        let original_path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let user_id = guards::require_user(&ctx, original_path)?;
        Ok(CurrentUser(user_id))
    }
}

/// Extractor that resolves the current user without requiring one.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<UserId>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = request_context(parts)?;
        Ok(MaybeUser(ctx.user_id))
    }
}

fn request_context(parts: &Parts) -> Result<RequestContext, GateError> {
    parts
        .extensions
        .get::<RequestContext>()
        .cloned()
        .ok_or_else(|| GateError::Internal("session middleware not installed".to_string()))
}
