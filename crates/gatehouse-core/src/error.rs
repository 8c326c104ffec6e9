use axum::http::StatusCode;
use axum::response::Redirect;
use serde::Serialize;
use thiserror::Error;

use crate::response::ApiResponse;
use crate::session::guards;

/// Standard error type for the Gatehouse request-gating pipeline.
///
/// Security-relevant variants fail closed: a missing session, an unreachable
/// store, or a malformed token always denies the request.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The session backing store could not be reached (or timed out).
    /// Never treated as "no session" — that would let an attacker bypass
    /// CSRF checks by forcing store failures.
    #[error("Session store unavailable: {0}")]
    SessionStoreUnavailable(String),

    #[error("CSRF token missing")]
    CsrfTokenMissing,

    #[error("CSRF token mismatch")]
    CsrfTokenMismatch,

    /// No user resolved for a guarded route. Rendered as a redirect to the
    /// login page carrying the originally requested path in `next`.
    #[error("Authentication required")]
    Unauthenticated { next: String },

    /// A user is resolved on a route that only makes sense for anonymous
    /// visitors (login, registration). Rendered as a redirect to `/`.
    #[error("Already authenticated")]
    AlreadyAuthenticated,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl GateError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GateError::SessionStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::CsrfTokenMissing => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::CsrfTokenMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::Unauthenticated { .. } => StatusCode::SEE_OTHER,
            GateError::AlreadyAuthenticated => StatusCode::SEE_OTHER,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the machine-readable error code for this error.
    ///
    /// Clients key off `CSRF_TOKEN_MISSING` / `CSRF_TOKEN_MISMATCH` to offer
    /// a "refresh page" action instead of a generic failure message.
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::NotFound(_) => "NOT_FOUND",
            GateError::BadRequest(_) => "BAD_REQUEST",
            GateError::SessionStoreUnavailable(_) => "SESSION_STORE_UNAVAILABLE",
            GateError::CsrfTokenMissing => "CSRF_TOKEN_MISSING",
            GateError::CsrfTokenMismatch => "CSRF_TOKEN_MISMATCH",
            GateError::Unauthenticated { .. } => "UNAUTHENTICATED",
            GateError::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            GateError::Internal(_) => "INTERNAL_ERROR",
            GateError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether this error carries internal detail that must not reach clients.
    fn is_internal(&self) -> bool {
        matches!(
            self,
            GateError::SessionStoreUnavailable(_) | GateError::Internal(_) | GateError::Database(_)
        )
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl axum::response::IntoResponse for GateError {
    fn into_response(self) -> axum::response::Response {
        match self {
            GateError::Unauthenticated { next } => {
                Redirect::to(&guards::login_redirect_target(&next)).into_response()
            }
            GateError::AlreadyAuthenticated => Redirect::to("/").into_response(),
            other => {
                let status = other.status_code();
                // Raw internal detail (store errors, DB errors) goes to the
                // log, not the client.
                let message = if other.is_internal() {
                    tracing::error!(code = other.error_code(), error = %other, "request failed");
                    match &other {
                        GateError::SessionStoreUnavailable(_) => {
                            "session store unavailable".to_string()
                        }
                        _ => "internal server error".to_string(),
                    }
                } else {
                    other.to_string()
                };
                let body = ApiResponse::<()>::error(other.error_code(), message);
                (status, axum::Json(body)).into_response()
            }
        }
    }
}
