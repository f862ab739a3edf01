//! Saving user inputs and transcripts under the data root

use modelvault_config::paths::{INPUTS_DIR_NAME, TRANSCRIPTS_DIR_NAME};
use modelvault_config::safe_filename;
use modelvault_sandbox::{SandboxError, ESCAPES_BASE};
use std::path::PathBuf;
use tracing::{error, info};

use crate::provisioner::DirectoryProvisioner;
use crate::{Result, StorageError};

const DEFAULT_INPUT_NAME: &str = "output.wav";
const DEFAULT_TRANSCRIPT_NAME: &str = "output.txt";

/// Writes files into the fixed data subdirectories
#[derive(Clone)]
pub struct FileStore {
    provisioner: DirectoryProvisioner,
}

impl FileStore {
    pub fn new(provisioner: DirectoryProvisioner) -> Self {
        Self { provisioner }
    }

    /// Write raw input bytes into `<data_root>/inputs/`
    pub async fn save_input(&self, data: &[u8], filename: &str) -> Result<PathBuf> {
        let path = self
            .write_into(INPUTS_DIR_NAME, filename, DEFAULT_INPUT_NAME, data)
            .await?;
        info!("input saved: {:?}", path);
        Ok(path)
    }

    /// Write UTF-8 text into `<data_root>/transcripts/`
    pub async fn save_transcript(&self, text: &str, filename: &str) -> Result<PathBuf> {
        let path = self
            .write_into(
                TRANSCRIPTS_DIR_NAME,
                filename,
                DEFAULT_TRANSCRIPT_NAME,
                text.as_bytes(),
            )
            .await?;
        info!("transcript saved: {:?}", path);
        Ok(path)
    }

    async fn write_into(
        &self,
        subdir: &str,
        filename: &str,
        default_name: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let dir = self.provisioner.data_path(subdir).await;
        self.provisioner.ensure_directory(&dir).await?;

        // a name is one component; separators are never rewritten into it
        if filename.contains(['/', '\\']) {
            let path = dir.join(filename);
            error!("file name escapes {:?}: {:?}", dir, filename);
            return Err(SandboxError::SecurityViolation {
                reason: ESCAPES_BASE,
                path,
            }
            .into());
        }

        let name = if filename.is_empty() {
            default_name.to_string()
        } else {
            safe_filename(filename)
        };
        let target = self.provisioner.sandbox().join(&dir, &name)?;

        if let Err(e) = tokio::fs::write(target.as_path(), data).await {
            error!("write failed: {}: {}", target, e);
            return Err(StorageError::filesystem(target.as_path(), e));
        }
        Ok(target.into_path_buf())
    }
}
