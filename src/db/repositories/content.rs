use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::entities::content;
use crate::models::ContentEntry;

pub struct ContentRepository {
    conn: DatabaseConnection,
}

impl ContentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, project: &str) -> Result<Vec<ContentEntry>> {
        let models = content::Entity::find()
            .filter(content::Column::Project.eq(project))
            .order_by_asc(content::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list content")?;

        models.into_iter().map(to_domain).collect()
    }

    pub async fn get(&self, project: &str, id: &str) -> Result<Option<ContentEntry>> {
        let model = content::Entity::find_by_id(id)
            .filter(content::Column::Project.eq(project))
            .one(&self.conn)
            .await
            .context("Failed to query content entry")?;

        model.map(to_domain).transpose()
    }

    pub async fn insert(&self, entry: &ContentEntry) -> Result<()> {
        to_active(entry)?
            .insert(&self.conn)
            .await
            .context("Failed to insert content entry")?;

        Ok(())
    }

    pub async fn update(&self, entry: &ContentEntry) -> Result<bool> {
        let mut active = to_active(entry)?;
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let result = content::Entity::update_many()
            .set(active)
            .filter(content::Column::Id.eq(entry.id.as_str()))
            .filter(content::Column::Project.eq(entry.project.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to update content entry")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete(&self, project: &str, id: &str) -> Result<bool> {
        let result = content::Entity::delete_many()
            .filter(content::Column::Id.eq(id))
            .filter(content::Column::Project.eq(project))
            .exec(&self.conn)
            .await
            .context("Failed to delete content entry")?;

        Ok(result.rows_affected > 0)
    }

    /// Replaces every entry of `project` with `entries`, atomically. Used by
    /// backup restore: either the whole snapshot lands or nothing changes.
    pub async fn replace_project(&self, project: &str, entries: &[ContentEntry]) -> Result<()> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to open restore transaction")?;

        content::Entity::delete_many()
            .filter(content::Column::Project.eq(project))
            .exec(&txn)
            .await
            .context("Failed to clear project content")?;

        for entry in entries {
            to_active(entry)?
                .insert(&txn)
                .await
                .context("Failed to insert restored entry")?;
        }

        txn.commit()
            .await
            .context("Failed to commit restore transaction")?;

        Ok(())
    }

    /// Distinct project names that currently hold content.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let projects: Vec<String> = content::Entity::find()
            .select_only()
            .column(content::Column::Project)
            .distinct()
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to list projects")?;

        Ok(projects)
    }
}

fn to_domain(model: content::Model) -> Result<ContentEntry> {
    let properties =
        serde_json::from_str(&model.properties).context("Corrupt properties on content row")?;

    Ok(ContentEntry {
        id: model.id,
        project: model.project,
        schema_id: model.schema_id,
        title: model.title,
        properties,
        published: model.published,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn to_active(entry: &ContentEntry) -> Result<content::ActiveModel> {
    let properties =
        serde_json::to_string(&entry.properties).context("Failed to serialize properties")?;

    Ok(content::ActiveModel {
        id: Set(entry.id.clone()),
        project: Set(entry.project.clone()),
        schema_id: Set(entry.schema_id.clone()),
        title: Set(entry.title.clone()),
        properties: Set(properties),
        published: Set(entry.published),
        created_at: Set(entry.created_at.clone()),
        updated_at: Set(entry.updated_at.clone()),
    })
}
