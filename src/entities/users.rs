use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub username: String,

    pub full_name: String,

    pub is_admin: bool,

    /// Hex HMAC-SHA-512 digest of the password, keyed by the salt.
    pub password_hash: String,

    /// Hex-encoded random salt, unique per user.
    pub password_salt: String,

    /// JSON-encoded ordered list of active bearer tokens.
    pub tokens: String,

    /// JSON-encoded map of project name to scope strings.
    pub scopes: String,

    /// Optimistic-concurrency counter checked on every update.
    pub revision: i64,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
