//! Gatehouse prelude — import everything you need with one line.
//!
//! ```rust,ignore
//! use gatehouse_core::prelude::*;
//! ```

// ── Core types ─────────────────────────────────────────────────
pub use crate::ApiResponse;
pub use crate::App;
pub use crate::AppState;
pub use crate::Config;
pub use crate::GateError;
pub use crate::RequestContext;
pub use crate::UserId;

// ── Sessions & guards ──────────────────────────────────────────
pub use crate::session::guards::{is_safe_next, require_no_user, require_user};
pub use crate::session::{Session, SessionService, SessionStore};

// ── Extractors ─────────────────────────────────────────────────
pub use crate::extractors::{CurrentUser, MaybeUser};

// ── GraphQL dispatch ───────────────────────────────────────────
pub use crate::graphql::{graphql_routes, GraphQLContext, GraphQLExecutor, GraphQLRequest};

// ── Router & routing ───────────────────────────────────────────
pub use axum::extract::State;
pub use axum::response::IntoResponse;
pub use axum::routing::{delete, get, patch, post, put};
pub use axum::{Extension, Json, Router};

// ── Serde (almost every handler needs these) ───────────────────
pub use serde::{Deserialize, Serialize};
