//! Tests for saving inputs and transcripts

use modelvault_sandbox::ESCAPES_BASE;
use modelvault_storage::{
    DesktopProfile, DirectoryProvisioner, FileStore, SandboxError, StorageError,
};
use std::sync::Arc;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> (FileStore, std::path::PathBuf) {
    let data_root = dir.path().join("data");
    let provisioner = DirectoryProvisioner::new(Arc::new(DesktopProfile::isolated(&data_root)));
    (FileStore::new(provisioner), data_root)
}

#[tokio::test]
async fn test_save_input_writes_bytes() {
    let dir = TempDir::new().unwrap();
    let (store, data_root) = store_in(&dir);

    let path = store.save_input(&[1, 2, 3, 4], "clip.wav").await.unwrap();

    assert_eq!(path, data_root.canonicalize().unwrap().join("inputs/clip.wav"));
    assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_save_transcript_writes_text() {
    let dir = TempDir::new().unwrap();
    let (store, _data_root) = store_in(&dir);

    let path = store
        .save_transcript("olá, mundo", "session-1.txt")
        .await
        .unwrap();

    assert!(path.ends_with("transcripts/session-1.txt"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "olá, mundo");
}

#[tokio::test]
async fn test_empty_filename_uses_default() {
    let dir = TempDir::new().unwrap();
    let (store, _data_root) = store_in(&dir);

    let input = store.save_input(b"RIFF", "").await.unwrap();
    let transcript = store.save_transcript("text", "").await.unwrap();

    assert!(input.ends_with("inputs/output.wav"));
    assert!(transcript.ends_with("transcripts/output.txt"));
}

#[tokio::test]
async fn test_separators_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (store, data_root) = store_in(&dir);

    for name in ["../../etc/passwd", "nested/t.txt", "..\\evil.txt"] {
        let err = store.save_transcript("x", name).await.unwrap_err();
        assert!(
            matches!(
                err,
                StorageError::Security(SandboxError::SecurityViolation {
                    reason: ESCAPES_BASE,
                    ..
                })
            ),
            "accepted {name:?}"
        );
    }
    let written = std::fs::read_dir(data_root.join("transcripts")).unwrap().count();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_reserved_characters_are_replaced() {
    let dir = TempDir::new().unwrap();
    let (store, _data_root) = store_in(&dir);

    let path = store.save_transcript("x", "a:b?.txt").await.unwrap();

    assert!(path.ends_with("transcripts/a_b_.txt"));
}

#[tokio::test]
async fn test_parent_dir_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (store, data_root) = store_in(&dir);

    let err = store.save_transcript("x", "..").await.unwrap_err();

    assert!(matches!(err, StorageError::Security(_)));
    assert!(!data_root.join("transcripts").join("..").is_file());
}

#[tokio::test]
async fn test_overwrites_existing_file() {
    let dir = TempDir::new().unwrap();
    let (store, _data_root) = store_in(&dir);

    store.save_transcript("first", "t.txt").await.unwrap();
    let path = store.save_transcript("second", "t.txt").await.unwrap();

    assert_eq!(std::fs::read_to_string(path).unwrap(), "second");
}
