use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::error::GateError;
use crate::models::session;
use crate::session::store::{Session, SessionStore};

/// Session store backed by PostgreSQL (or SQLite in tests) through sea-orm.
///
/// Atomicity comes from the database: `create` and `update` are single-row
/// statements, so concurrent writers to one session id serialize on the
/// row and the last write wins.
#[derive(Clone)]
pub struct SeaOrmSessionStore {
    db: DatabaseConnection,
}

impl SeaOrmSessionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        SeaOrmSessionStore { db }
    }
}

impl From<session::Model> for Session {
    fn from(model: session::Model) -> Self {
        Session {
            id: model.id,
            user_id: model.user_id,
            csrf_secret: model.csrf_secret,
            created_at: model.created_at,
            expires_at: model.expires_at,
        }
    }
}

#[async_trait]
impl SessionStore for SeaOrmSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, GateError> {
        let found = session::Entity::find_by_id(id.to_owned())
            .one(&self.db)
            .await?;
        Ok(found.map(Session::from))
    }

    async fn create(&self, record: &Session) -> Result<(), GateError> {
        let model = session::ActiveModel {
            id: Set(record.id.clone()),
            user_id: Set(record.user_id),
            csrf_secret: Set(record.csrf_secret.clone()),
            created_at: Set(record.created_at),
            expires_at: Set(record.expires_at),
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    async fn update(&self, record: &Session) -> Result<(), GateError> {
        let existing = session::Entity::find_by_id(record.id.clone())
            .one(&self.db)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("session {} not found", record.id)))?;

        let mut active: session::ActiveModel = existing.into();
        active.user_id = Set(record.user_id);
        active.csrf_secret = Set(record.csrf_secret.clone());
        active.expires_at = Set(record.expires_at);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), GateError> {
        session::Entity::delete_by_id(id.to_owned())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
