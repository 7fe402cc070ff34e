use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::users;
use crate::models::{AuthToken, Credential, User};

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        model.map(to_domain).transpose()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let model = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        model.map(to_domain).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<User>> {
        let models = users::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        models.into_iter().map(to_domain).collect()
    }

    /// Users holding at least one scope on `project`. Scope maps live in a
    /// JSON column, so the filter happens after decoding.
    pub async fn list_for_project(&self, project: &str) -> Result<Vec<User>> {
        let all = self.list_all().await?;
        Ok(all.into_iter().filter(|u| u.is_scoped_to(project)).collect())
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        to_active(user)?
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(())
    }

    /// Persists `user` only if its stored revision still matches. Returns
    /// `false` when a concurrent write won; the caller re-reads and retries.
    pub async fn update(&self, user: &User) -> Result<bool> {
        let mut active = to_active(user)?;
        active.revision = Set(user.revision + 1);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let result = users::Entity::update_many()
            .set(active)
            .filter(users::Column::Id.eq(user.id.as_str()))
            .filter(users::Column::Revision.eq(user.revision))
            .exec(&self.conn)
            .await
            .context("Failed to update user")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

fn to_domain(model: users::Model) -> Result<User> {
    let tokens: Vec<AuthToken> =
        serde_json::from_str(&model.tokens).context("Corrupt token list on user row")?;
    let scopes: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&model.scopes).context("Corrupt scope map on user row")?;

    Ok(User {
        id: model.id,
        username: model.username,
        full_name: model.full_name,
        is_admin: model.is_admin,
        credential: Credential {
            hash: model.password_hash,
            salt: model.password_salt,
        },
        tokens,
        scopes,
        revision: model.revision,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn to_active(user: &User) -> Result<users::ActiveModel> {
    let tokens = serde_json::to_string(&user.tokens).context("Failed to serialize tokens")?;
    let scopes = serde_json::to_string(&user.scopes).context("Failed to serialize scopes")?;

    Ok(users::ActiveModel {
        id: Set(user.id.clone()),
        username: Set(user.username.clone()),
        full_name: Set(user.full_name.clone()),
        is_admin: Set(user.is_admin),
        password_hash: Set(user.credential.hash.clone()),
        password_salt: Set(user.credential.salt.clone()),
        tokens: Set(tokens),
        scopes: Set(scopes),
        revision: Set(user.revision),
        created_at: Set(user.created_at.clone()),
        updated_at: Set(user.updated_at.clone()),
    })
}
