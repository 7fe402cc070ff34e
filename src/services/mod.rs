pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginResult, UserInfo};
pub use auth_service_impl::SeaOrmAuthService;

pub mod backup_service;
pub mod backup_service_impl;
pub use backup_service::{BackupError, BackupService, RemoteStorageConfig};
pub use backup_service_impl::{FsBackupService, load_remote_config};

pub mod media;
pub use media::{MediaError, MediaItem, MediaService};

pub mod upload;
pub use upload::UploadService;

pub mod scheduler;
pub use scheduler::Scheduler;
