use std::path::PathBuf;

use hashbrown_cms::db::Store;
use hashbrown_cms::models::ContentEntry;
use hashbrown_cms::services::{
    BackupError, BackupService, FsBackupService, MediaError, MediaService, UploadService,
};

async fn test_store() -> Store {
    Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("Failed to open in-memory store")
}

fn backup_service(store: Store, root: &tempfile::TempDir) -> FsBackupService {
    FsBackupService::new(store, root.path().to_path_buf())
}

async fn seed_entry(store: &Store, project: &str, title: &str) -> ContentEntry {
    let entry = ContentEntry::new(
        project,
        "article",
        title,
        serde_json::json!({ "body": "text" }),
    );
    store.insert_content(&entry).await.expect("insert failed");
    entry
}

#[tokio::test]
async fn test_create_and_list_archives() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    seed_entry(&store, "site", "First").await;

    let backups = backup_service(store, &root);

    let timestamp = backups.create("site").await.unwrap();
    assert!(timestamp.parse::<i64>().is_ok());

    let listed = backups.list("site").await.unwrap();
    assert_eq!(listed, vec![timestamp.clone()]);

    // archive sits under {project}/dump/{timestamp}.hba
    let expected: PathBuf = root.path().join("site").join("dump").join(format!("{timestamp}.hba"));
    assert!(expected.is_file());

    // a project with no dump directory lists empty
    assert!(backups.list("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_archive() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    let backups = backup_service(store, &root);

    let timestamp = backups.create("site").await.unwrap();
    backups.delete("site", &timestamp).await.unwrap();
    assert!(backups.list("site").await.unwrap().is_empty());

    let err = backups.delete("site", &timestamp).await.unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));

    let err = backups.path("site", &timestamp).await.unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));
}

#[tokio::test]
async fn test_restore_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    let original = seed_entry(&store, "site", "Keep me").await;

    let backups = backup_service(store.clone(), &root);
    let timestamp = backups.create("site").await.unwrap();

    // mutate the project after the dump
    store.delete_content("site", &original.id).await.unwrap();
    seed_entry(&store, "site", "Impostor").await;

    backups.restore("site", &timestamp).await.unwrap();

    let restored = store.list_content("site").await.unwrap();
    assert_eq!(restored, vec![original]);
}

#[tokio::test]
async fn test_restore_missing_archive() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    let backups = backup_service(store, &root);

    let err = backups.restore("site", "1234567890123").await.unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));
}

#[tokio::test]
async fn test_restore_rejects_corrupt_archive() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    seed_entry(&store, "site", "Survivor").await;

    let backups = backup_service(store.clone(), &root);

    let dump_dir = root.path().join("site").join("dump");
    tokio::fs::create_dir_all(&dump_dir).await.unwrap();
    tokio::fs::write(dump_dir.join("1111111111111.hba"), b"not a real archive")
        .await
        .unwrap();

    let err = backups.restore("site", "1111111111111").await.unwrap_err();
    assert!(matches!(err, BackupError::Validation(_)));

    // the failed restore must not have touched the database
    let content = store.list_content("site").await.unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].title, "Survivor");
}

#[tokio::test]
async fn test_restore_rejects_project_mismatch() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    seed_entry(&store, "site-a", "A's content").await;

    let backups = backup_service(store, &root);
    let timestamp = backups.create("site-a").await.unwrap();

    // file an archive of site-a under site-b's dump directory
    let archive = root
        .path()
        .join("site-a")
        .join("dump")
        .join(format!("{timestamp}.hba"));
    let foreign_dir = root.path().join("site-b").join("dump");
    tokio::fs::create_dir_all(&foreign_dir).await.unwrap();
    tokio::fs::copy(&archive, foreign_dir.join(format!("{timestamp}.hba")))
        .await
        .unwrap();

    let err = backups.restore("site-b", &timestamp).await.unwrap_err();
    assert!(matches!(err, BackupError::Validation(_)));
}

#[tokio::test]
async fn test_accept_upload_files_archive_by_timestamp() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    seed_entry(&store, "site", "Exported").await;

    let backups = backup_service(store.clone(), &root);
    let uploads = UploadService::new(root.path().to_path_buf());

    let timestamp = backups.create("site").await.unwrap();
    let archive = backups.path("site", &timestamp).await.unwrap();
    let bytes = tokio::fs::read(&archive).await.unwrap();
    backups.delete("site", &timestamp).await.unwrap();

    // re-upload the archive through the staging area
    let staged = uploads
        .stage_raw("site", &format!("{timestamp}.hba"), &bytes)
        .await
        .unwrap();
    let accepted = backups.accept_upload("site", &staged).await.unwrap();
    assert_eq!(accepted, timestamp);

    assert_eq!(backups.list("site").await.unwrap(), vec![timestamp.clone()]);
    backups.restore("site", &timestamp).await.unwrap();
}

#[tokio::test]
async fn test_accept_upload_rejects_non_timestamp_names() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    let backups = backup_service(store, &root);
    let uploads = UploadService::new(root.path().to_path_buf());

    let staged = uploads
        .stage_raw("site", "evil-name.hba", b"whatever")
        .await
        .unwrap();

    let err = backups.accept_upload("site", &staged).await.unwrap_err();
    assert!(matches!(err, BackupError::Validation(_)));
}

#[tokio::test]
async fn test_media_set_replaces_previous_file() {
    let root = tempfile::tempdir().unwrap();
    let media = MediaService::new(root.path().to_path_buf());

    media
        .set("site", "logo", "Old Logo.PNG", b"old bytes")
        .await
        .unwrap();

    // the stem is normalized, the extension stays as uploaded
    let path = media.get("site", "logo").await.unwrap().unwrap();
    assert_eq!(path.file_name().unwrap(), "old-logo.PNG");

    // writing the same id with a new name drops the old file entirely
    media
        .set("site", "logo", "new logo.svg", b"<svg/>")
        .await
        .unwrap();

    let path = media.get("site", "logo").await.unwrap().unwrap();
    assert_eq!(path.file_name().unwrap(), "new-logo.svg");

    let items = media.list("site").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "logo");
    assert_eq!(items[0].name, "new-logo.svg");
}

#[tokio::test]
async fn test_media_remove() {
    let root = tempfile::tempdir().unwrap();
    let media = MediaService::new(root.path().to_path_buf());

    media.set("site", "banner", "banner.jpg", b"jpg").await.unwrap();
    media.remove("site", "banner").await.unwrap();

    assert!(media.get("site", "banner").await.unwrap().is_none());
    assert!(media.remove("site", "banner").await.is_err());
}

#[tokio::test]
async fn test_staged_upload_lands_in_temp_with_normalized_name() {
    let root = tempfile::tempdir().unwrap();
    let uploads = UploadService::new(root.path().to_path_buf());

    let staged = uploads
        .stage("site", "Holiday Snap!.JPG", b"pixels")
        .await
        .unwrap();

    assert_eq!(staged.file_name().unwrap(), "holiday-snap-.JPG");
    assert!(staged.starts_with(root.path().join("site").join("temp")));
    assert_eq!(tokio::fs::read(&staged).await.unwrap(), b"pixels");
}

#[tokio::test]
async fn test_media_rejects_ids_that_escape_the_project() {
    let root = tempfile::tempdir().unwrap();
    let media = MediaService::new(root.path().to_path_buf());

    media
        .set("site-b", "secret", "own.txt", b"theirs")
        .await
        .unwrap();

    // an id crossing into another project's tree is refused outright
    let id = "../../site-b/media/secret";
    assert!(matches!(
        media.set("site-a", id, "own.txt", b"owned").await.unwrap_err(),
        MediaError::Validation(_)
    ));
    assert!(matches!(
        media.get("site-a", id).await.unwrap_err(),
        MediaError::Validation(_)
    ));
    assert!(matches!(
        media.remove("site-a", id).await.unwrap_err(),
        MediaError::Validation(_)
    ));

    // site-b's item is untouched
    let path = media.get("site-b", "secret").await.unwrap().unwrap();
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"theirs");

    // the project segment is held to the same rule
    assert!(media.list("../site-b").is_err());
    assert!(media.set("../site-b", "x", "a.txt", b"x").await.is_err());
}

#[tokio::test]
async fn test_backups_reject_path_escaping_names() {
    let root = tempfile::tempdir().unwrap();
    let store = test_store().await;
    let backups = backup_service(store, &root);

    let err = backups.create("../outside").await.unwrap_err();
    assert!(matches!(err, BackupError::Validation(_)));

    for timestamp in ["../../../etc/passwd", "..", "a/b"] {
        assert!(matches!(
            backups.delete("site", timestamp).await.unwrap_err(),
            BackupError::Validation(_)
        ));
        assert!(matches!(
            backups.restore("site", timestamp).await.unwrap_err(),
            BackupError::Validation(_)
        ));
        assert!(matches!(
            backups.path("site", timestamp).await.unwrap_err(),
            BackupError::Validation(_)
        ));
    }
}

#[tokio::test]
async fn test_stage_rejects_escaping_names() {
    let root = tempfile::tempdir().unwrap();
    let uploads = UploadService::new(root.path().to_path_buf());

    assert!(uploads.stage("../outside", "a.txt", b"x").await.is_err());
    assert!(
        uploads
            .stage_raw("site", "1234.hba/../../escape", b"x")
            .await
            .is_ok_and(|p| p.starts_with(root.path().join("site").join("temp")))
    );
    assert!(uploads.stage_raw("site", "..", b"x").await.is_err());
}

#[tokio::test]
async fn test_media_set_from_staged_moves_file() {
    let root = tempfile::tempdir().unwrap();
    let uploads = UploadService::new(root.path().to_path_buf());
    let media = MediaService::new(root.path().to_path_buf());

    let staged = uploads.stage("site", "Cover.png", b"pixels").await.unwrap();
    media.set_from_staged("site", "cover", &staged).await.unwrap();

    // gone from staging, present under the media id
    assert!(!staged.exists());
    let path = media.get("site", "cover").await.unwrap().unwrap();
    assert_eq!(path.file_name().unwrap(), "cover.png");
    assert_eq!(tokio::fs::read(&path).await.unwrap(), b"pixels");
}
