use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::GateError;
use crate::session::store::{Session, SessionStore};

const KEY_PREFIX: &str = "gatehouse:session:";

fn key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn store_err(err: redis::RedisError) -> GateError {
    GateError::SessionStoreUnavailable(err.to_string())
}

/// Session store backed by Redis, with TTL enforced by `SET .. EX`.
///
/// `SET` is atomic per key, so concurrent writers to one session id are
/// last-write-wins, matching the other backends.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str) -> Result<Self, GateError> {
        let client = redis::Client::open(redis_url).map_err(store_err)?;
        let conn = ConnectionManager::new(client).await.map_err(store_err)?;
        Ok(RedisSessionStore { conn })
    }

    fn ttl_secs(session: &Session) -> u64 {
        let remaining = session.expires_at - Utc::now().naive_utc();
        remaining.num_seconds().max(1) as u64
    }

    async fn put(&self, session: &Session) -> Result<(), GateError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| GateError::Internal(format!("session serialize error: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key(&session.id), raw, Self::ttl_secs(session))
            .await
            .map_err(store_err)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, GateError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key(id)).await.map_err(store_err)?;
        match raw {
            Some(raw) => {
                let session = serde_json::from_str(&raw)
                    .map_err(|e| GateError::Internal(format!("session deserialize error: {e}")))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, session: &Session) -> Result<(), GateError> {
        self.put(session).await
    }

    async fn update(&self, session: &Session) -> Result<(), GateError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key(&session.id)).await.map_err(store_err)?;
        if !exists {
            return Err(GateError::NotFound(format!(
                "session {} not found",
                session.id
            )));
        }
        self.put(session).await
    }

    async fn destroy(&self, id: &str) -> Result<(), GateError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key(id)).await.map_err(store_err)
    }
}
