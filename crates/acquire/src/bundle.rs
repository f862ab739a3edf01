//! Installed bundles and acquisition reports

use modelvault_storage::Warning;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive;

/// A model bundle on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBundle {
    pub code: String,
    pub path: PathBuf,
    /// Required files not found after installation
    pub missing_files: Vec<String>,
}

impl ModelBundle {
    /// Look up an installed bundle for `code` under `root`
    pub fn inspect(root: &Path, code: &str) -> Option<Self> {
        let path = root.join(code);
        if !archive::is_populated(&path) {
            return None;
        }
        Some(Self {
            code: code.to_string(),
            missing_files: archive::missing_files(&path),
            path,
        })
    }

    /// All populated bundle directories under `root`, sorted by code.
    ///
    /// Scratch entries (staging dirs, partial assemblies) are skipped.
    pub fn list(root: &Path) -> std::io::Result<Vec<Self>> {
        let mut bundles = Vec::new();
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(bundles),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.starts_with("temp_") {
                continue;
            }
            if let Some(bundle) = Self::inspect(root, &name) {
                bundles.push(bundle);
            }
        }
        bundles.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(bundles)
    }

    pub fn is_complete(&self) -> bool {
        self.missing_files.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

/// One pass of download and install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAttempt {
    /// 1-based
    pub index: u32,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    /// Wait taken before the next attempt
    pub backoff: Option<Duration>,
}

/// Result of [`crate::ModelAcquisitionPipeline::acquire`]
#[derive(Debug, Clone)]
pub struct AcquireReport {
    pub bundle: ModelBundle,
    /// Empty when an installed bundle was reused
    pub attempts: Vec<DownloadAttempt>,
    pub warnings: Vec<Warning>,
    pub reused: bool,
}

impl AcquireReport {
    /// Backoff waits taken between attempts
    pub fn backoff_waits(&self) -> Vec<Duration> {
        self.attempts.iter().filter_map(|a| a.backoff).collect()
    }
}
