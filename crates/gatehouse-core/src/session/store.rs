use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as TtlDuration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::GateError;
use crate::session::csrf::generate_csrf_secret;

/// Server-side session record, addressed by the opaque id carried in the
/// session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Cryptographically random identifier (never predictable/sequential).
    pub id: String,

    /// The authenticated user, or None for an anonymous session.
    pub user_id: Option<i64>,

    /// Per-session CSRF secret; the client only ever sees a token derived
    /// from it.
    pub csrf_secret: String,

    pub created_at: NaiveDateTime,

    /// The session is invalid once `now > expires_at`.
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().naive_utc()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Generate an opaque session identifier (32 random bytes, hex-encoded).
pub fn generate_session_id() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Pluggable session persistence.
///
/// `update` replaces the whole record: concurrent writers to the same id are
/// last-write-wins, which is acceptable for this record shape (a handful of
/// scalar fields owned by one browser).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by id. Expiry is not the store's concern; callers
    /// go through [`SessionService::load`] which enforces it.
    async fn get(&self, id: &str) -> Result<Option<Session>, GateError>;

    /// Persist a new session record.
    async fn create(&self, session: &Session) -> Result<(), GateError>;

    /// Replace an existing record. Fails with `NotFound` when the id does
    /// not exist.
    async fn update(&self, session: &Session) -> Result<(), GateError>;

    /// Delete a session. Idempotent: destroying a missing id is not an error.
    async fn destroy(&self, id: &str) -> Result<(), GateError>;
}

/// In-memory session store for development and testing.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, GateError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn create(&self, session: &Session) -> Result<(), GateError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update(&self, session: &Session) -> Result<(), GateError> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Err(GateError::NotFound(format!(
                "session {} not found",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), GateError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

/// The session service used by the middleware and by host applications.
///
/// Wraps a [`SessionStore`] with:
/// - a bounded timeout on every store call, surfaced as
///   `SessionStoreUnavailable` (5xx) so clients can distinguish "store
///   unreachable" from "token invalid";
/// - passive deletion of expired sessions on lookup;
/// - full session regeneration (new id + new CSRF secret) on every
///   privilege change, closing the session-fixation hole.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    ttl_hours: u64,
    timeout: Duration,
}

impl SessionService {
    /// Create a session service over the given backend.
    pub fn new(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        SessionService {
            store,
            ttl_hours: config.session_ttl_hours,
            timeout: Duration::from_secs(config.store_timeout_secs),
        }
    }

    /// Create a service backed by the in-memory store (dev/test).
    pub fn in_memory(config: &Config) -> Self {
        SessionService::new(Arc::new(InMemoryStore::new()), config)
    }

    fn fresh_session(&self, user_id: Option<i64>) -> Session {
        let now = Utc::now().naive_utc();
        Session {
            id: generate_session_id(),
            user_id,
            csrf_secret: generate_csrf_secret(),
            created_at: now,
            expires_at: now + TtlDuration::hours(self.ttl_hours as i64),
        }
    }

    /// Run a store call under the configured timeout, mapping every failure
    /// except `NotFound` to `SessionStoreUnavailable`. Fail closed: callers
    /// never observe a store failure as "anonymous".
    async fn guard<T, F>(&self, op: F) -> Result<T, GateError>
    where
        F: Future<Output = Result<T, GateError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err @ GateError::NotFound(_))) => Err(err),
            Ok(Err(err)) => Err(GateError::SessionStoreUnavailable(err.to_string())),
            Err(_) => Err(GateError::SessionStoreUnavailable(
                "session store call timed out".to_string(),
            )),
        }
    }

    /// Load a live session by id. Expired sessions are destroyed on the spot
    /// and reported as absent.
    pub async fn load(&self, id: &str) -> Result<Option<Session>, GateError> {
        match self.guard(self.store.get(id)).await? {
            Some(session) if session.is_expired() => {
                self.guard(self.store.destroy(&session.id)).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Create a fresh anonymous session.
    pub async fn create_anonymous(&self) -> Result<Session, GateError> {
        let session = self.fresh_session(None);
        self.guard(self.store.create(&session)).await?;
        Ok(session)
    }

    /// Elevate a session to an authenticated user.
    ///
    /// The old record is destroyed and a brand-new session (new id, new CSRF
    /// secret) is created, so neither the pre-login cookie nor a pre-login
    /// CSRF token survives the privilege change.
    pub async fn log_in(&self, current: &Session, user_id: i64) -> Result<Session, GateError> {
        self.guard(self.store.destroy(&current.id)).await?;
        let session = self.fresh_session(Some(user_id));
        self.guard(self.store.create(&session)).await?;
        tracing::debug!(session_id = %session.id, user_id, "session regenerated on login");
        Ok(session)
    }

    /// Drop back to an anonymous session, regenerating id and secret.
    pub async fn log_out(&self, current: &Session) -> Result<Session, GateError> {
        self.guard(self.store.destroy(&current.id)).await?;
        let session = self.fresh_session(None);
        self.guard(self.store.create(&session)).await?;
        Ok(session)
    }

    /// Persist changes to an existing session (last-write-wins).
    pub async fn save(&self, session: &Session) -> Result<(), GateError> {
        self.guard(self.store.update(session)).await
    }

    /// Destroy a session by id. Idempotent.
    pub async fn destroy(&self, id: &str) -> Result<(), GateError> {
        self.guard(self.store.destroy(id)).await
    }
}
