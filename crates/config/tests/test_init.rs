//! Tests for init-style workflows against explicit paths

use modelvault_config::Config;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_behavior_simulation() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.json");

    assert!(!config_path.exists());

    let mut config = Config::default();
    config.storage.data_dir = temp_dir.path().join("data").display().to_string();
    config.save_to(&config_path).await.expect("Failed to save");

    let loaded = Config::load_from(&config_path)
        .await
        .expect("Failed to load");
    tokio::fs::create_dir_all(loaded.data_root())
        .await
        .expect("Failed to create data root");

    assert!(loaded.data_root().is_dir());
    assert_eq!(loaded.models_root(), temp_dir.path().join("data/models"));
}

#[tokio::test]
async fn test_init_existing_config_is_preserved() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.json");

    let mut config = Config::default();
    config.download.max_attempts = 7;
    config.save_to(&config_path).await.expect("Failed to save");

    let loaded = Config::load_from(&config_path)
        .await
        .expect("Failed to load");
    assert_eq!(loaded.download.max_attempts, 7);
}
