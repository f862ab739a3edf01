//! Garbage collection of abandoned temp directories

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::provisioner::DirectoryProvisioner;
use crate::{Result, StorageError, Warning};

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct ReclaimReport {
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<Warning>,
}

impl ReclaimReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Removes everything directly under the temp root.
///
/// Not transactional: must not run while a live [`crate::TempDirectory`]
/// is in use.
#[derive(Clone)]
pub struct TempLifecycleManager {
    provisioner: DirectoryProvisioner,
}

impl TempLifecycleManager {
    pub fn new(provisioner: DirectoryProvisioner) -> Self {
        Self { provisioner }
    }

    /// Delete every entry under the temp root, skipping ones that fail
    pub async fn reclaim_orphans(&self) -> Result<ReclaimReport> {
        let temp_root = self.provisioner.temp_root().await;
        let report = sweep(&temp_root, remove_entry).await?;

        info!(
            "temp sweep of {:?}: {} removed, {} skipped",
            temp_root,
            report.removed.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

async fn remove_entry(path: PathBuf, is_dir: bool) -> io::Result<()> {
    if is_dir {
        tokio::fs::remove_dir_all(&path).await
    } else {
        tokio::fs::remove_file(&path).await
    }
}

async fn sweep<F, Fut>(root: &Path, mut remove: F) -> Result<ReclaimReport>
where
    F: FnMut(PathBuf, bool) -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut report = ReclaimReport::default();

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no temp root at {:?}", root);
            return Ok(report);
        }
        Err(e) => return Err(StorageError::filesystem(root, e)),
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(StorageError::filesystem(root, e)),
        };
        let path = entry.path();
        // symlinks are unlinked, never followed
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);

        match remove(path.clone(), is_dir).await {
            Ok(()) => {
                debug!("removed {:?}", path);
                report.removed.push(path);
            }
            Err(e) => {
                warn!("temp cleanup failed: {:?}: {}", path, e);
                report.skipped.push(Warning::new(&path, e.to_string()));
            }
        }
    }

    Ok(report)
}
