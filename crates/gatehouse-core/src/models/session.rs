use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Server-side session entity, keyed by the opaque id carried in the cookie.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque random identifier (the cookie carries a signed copy of this).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The authenticated user, or NULL for an anonymous session.
    pub user_id: Option<i64>,

    /// Per-session CSRF secret; clients only ever see a derived token.
    pub csrf_secret: String,

    pub created_at: NaiveDateTime,

    /// When the session expires (enforced on lookup; a sweeper may also
    /// delete by this column).
    pub expires_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
