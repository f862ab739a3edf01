//! Common test utilities for modelvault integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated HOME and TMPDIR for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub tmp_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let home = temp_dir.path().canonicalize()?;
        let config_dir = home.join(".modelvault");
        let data_dir = config_dir.join("data");
        let tmp_dir = home.join("tmp");

        std::fs::create_dir_all(&config_dir)?;
        std::fs::create_dir_all(&tmp_dir)?;

        Ok(Self {
            temp_dir,
            config_dir,
            data_dir,
            tmp_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Command with HOME and TMPDIR pointing into the test environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_modelvault"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("TMPDIR", &self.tmp_dir);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a config with the given model sources and fast retries
    pub fn create_config(&self, sources: &[(&str, &str)]) -> anyhow::Result<()> {
        let sources: serde_json::Map<String, serde_json::Value> = sources
            .iter()
            .map(|(code, url)| (code.to_string(), serde_json::Value::from(*url)))
            .collect();
        let config = serde_json::json!({
            "storage": { "data_dir": self.data_dir },
            "models": { "sources": sources },
            "download": { "max_attempts": 2, "backoff_step_secs": 0 }
        });
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

/// Zip holding every required model file under a wrapper directory
pub fn model_archive() -> Vec<u8> {
    let files = [
        "am/final.mdl",
        "conf/model.conf",
        "graph/phones/word_boundary.int",
        "graph/Gr.fst",
        "graph/HCLr.fst",
        "ivector/final.ie",
        "README",
    ];
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for file in files {
        writer
            .start_file(
                format!("model-small/{file}"),
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(b"data").unwrap();
    }
    writer.finish().unwrap().into_inner()
}
