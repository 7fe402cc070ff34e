use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use tracing::info;

use crate::models::{ContentEntry, ProjectSnapshot, User};

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn content_repo(&self) -> repositories::content::ContentRepository {
        repositories::content::ContentRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn list_users_for_project(&self, project: &str) -> Result<Vec<User>> {
        self.user_repo().list_for_project(project).await
    }

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        self.user_repo().insert(user).await
    }

    /// Compare-and-swap update keyed on the user's revision.
    pub async fn update_user(&self, user: &User) -> Result<bool> {
        self.user_repo().update(user).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    // ========== Content ==========

    pub async fn list_content(&self, project: &str) -> Result<Vec<ContentEntry>> {
        self.content_repo().list(project).await
    }

    pub async fn get_content(&self, project: &str, id: &str) -> Result<Option<ContentEntry>> {
        self.content_repo().get(project, id).await
    }

    pub async fn insert_content(&self, entry: &ContentEntry) -> Result<()> {
        self.content_repo().insert(entry).await
    }

    pub async fn update_content(&self, entry: &ContentEntry) -> Result<bool> {
        self.content_repo().update(entry).await
    }

    pub async fn delete_content(&self, project: &str, id: &str) -> Result<bool> {
        self.content_repo().delete(project, id).await
    }

    // ========== Snapshots ==========

    pub async fn export_project(&self, project: &str) -> Result<ProjectSnapshot> {
        let content = self.content_repo().list(project).await?;

        Ok(ProjectSnapshot {
            project: project.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            content,
        })
    }

    /// Swaps a project's content for the snapshot's, in one transaction.
    pub async fn import_project(&self, snapshot: &ProjectSnapshot) -> Result<()> {
        self.content_repo()
            .replace_project(&snapshot.project, &snapshot.content)
            .await
    }

    /// Projects known to the system: anything holding content, plus anything
    /// a user is scoped to.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects: BTreeSet<String> =
            self.content_repo().list_projects().await?.into_iter().collect();

        for user in self.user_repo().list_all().await? {
            projects.extend(user.scopes.keys().cloned());
        }

        Ok(projects.into_iter().collect())
    }
}
