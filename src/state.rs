use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, BackupService, FsBackupService, MediaService, SeaOrmAuthService, UploadService,
    load_remote_config,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub backups: Arc<dyn BackupService>,

    pub media: Arc<MediaService>,

    pub uploads: Arc<UploadService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let storage_root = PathBuf::from(&config.storage.root_path);
        tokio::fs::create_dir_all(&storage_root).await?;

        // Optional remote storage config lives in its own file; absence is
        // normal, and a malformed file only disables remote features
        let remote_config_path = PathBuf::from(&config.backup.remote_config_path);
        match load_remote_config(&remote_config_path).await {
            Ok(Some(remote)) => info!(url = %remote.url, "Remote backup storage configured"),
            Ok(None) => {}
            Err(err) => {
                error!("Remote storage config is unusable, remote backups disabled: {err}");
            }
        }

        let auth = Arc::new(SeaOrmAuthService::new(store.clone())) as Arc<dyn AuthService>;

        let backups = Arc::new(FsBackupService::new(store.clone(), storage_root.clone()))
            as Arc<dyn BackupService>;

        let media = Arc::new(MediaService::new(storage_root.clone()));
        let uploads = Arc::new(UploadService::new(storage_root));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            auth,
            backups,
            media,
            uploads,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
