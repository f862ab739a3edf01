//! Directory creation, permissions and temp directories

use chrono::Utc;
use modelvault_config::paths::TEMP_DIR_NAME;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::profile::StorageProfile;
use crate::{PathSandbox, ResolvedPath, Result, StorageError, Warning};

/// Mode for shared scratch directories written by several worker processes
const SHARED_TEMP_MODE: u32 = 0o777;

/// Mode for a directory handed to a single owner
const OWNER_ONLY_MODE: u32 = 0o700;

/// Creates and validates directories under the active storage profile
#[derive(Clone)]
pub struct DirectoryProvisioner {
    profile: Arc<dyn StorageProfile>,
}

impl DirectoryProvisioner {
    pub fn new(profile: Arc<dyn StorageProfile>) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &dyn StorageProfile {
        self.profile.as_ref()
    }

    /// Sandbox built from the profile's current roots
    pub fn sandbox(&self) -> PathSandbox {
        PathSandbox::from_roots(self.profile.root_candidates())
    }

    /// Validate `raw` against a freshly built sandbox
    pub fn validate(&self, raw: impl AsRef<Path>) -> Result<ResolvedPath> {
        Ok(self.sandbox().validate(raw)?)
    }

    /// Data root joined with `subdir`; an empty `subdir` yields the root
    pub async fn data_path(&self, subdir: &str) -> PathBuf {
        let base = self.profile.data_root().await;
        if subdir.is_empty() {
            base
        } else {
            base.join(subdir)
        }
    }

    /// Create the profile's data root if missing.
    ///
    /// Roots only match once they exist on disk.
    pub async fn ensure_data_root(&self) -> Result<Vec<Warning>> {
        let root = self.data_path("").await;
        self.ensure_directory(&root).await
    }

    /// Temp root under the data root
    pub async fn temp_root(&self) -> PathBuf {
        self.data_path(TEMP_DIR_NAME).await
    }

    /// Create `path` and its parents if missing.
    ///
    /// Directories inside the temp subtree are opened up to every user.
    /// Permission failures come back as warnings.
    pub async fn ensure_directory(&self, path: &Path) -> Result<Vec<Warning>> {
        if let Err(e) = tokio::fs::create_dir_all(path).await {
            error!("directory creation failed: {:?}: {}", path, e);
            return Err(StorageError::filesystem(path, e));
        }

        let mut warnings = Vec::new();
        if is_temp_path(path) {
            warnings.extend(set_mode(path, SHARED_TEMP_MODE).await);
        }
        Ok(warnings)
    }

    /// Create a uniquely named, owner-only directory under the temp root
    pub async fn new_temp_directory(&self) -> Result<TempDirectory> {
        let temp_root = self.temp_root().await;
        let mut warnings = self.ensure_directory(&temp_root).await?;

        let path = temp_root.join(temp_dir_name());
        if let Err(e) = tokio::fs::create_dir(&path).await {
            error!("temp directory creation failed: {:?}: {}", path, e);
            return Err(StorageError::filesystem(&path, e));
        }
        warnings.extend(set_mode(&path, OWNER_ONLY_MODE).await);

        let resolved = match self.validate(&path) {
            Ok(resolved) => resolved,
            Err(e) => {
                let _ = tokio::fs::remove_dir(&path).await;
                return Err(e);
            }
        };

        info!("created temp directory {}", resolved);
        Ok(TempDirectory {
            path: resolved.into_path_buf(),
            warnings,
        })
    }
}

/// A per-process scratch directory
#[derive(Debug)]
pub struct TempDirectory {
    path: PathBuf,
    warnings: Vec<Warning>,
}

impl TempDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hardening steps that did not apply
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Delete the directory and its contents
    pub async fn remove(self) -> std::io::Result<()> {
        tokio::fs::remove_dir_all(&self.path).await
    }
}

fn temp_dir_name() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "temp_{}_{}_{}",
        std::process::id(),
        &random[..8],
        Utc::now().timestamp()
    )
}

fn is_temp_path(path: &Path) -> bool {
    path.components()
        .any(|component| component.as_os_str() == TEMP_DIR_NAME)
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Option<Warning> {
    use std::os::unix::fs::PermissionsExt;

    match tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await {
        Ok(()) => {
            debug!("set mode {:o} on {:?}", mode, path);
            None
        }
        Err(e) => {
            warn!("permission setting failed on {:?}: {}", path, e);
            Some(Warning::new(path, format!("chmod {:o} failed: {}", mode, e)))
        }
    }
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Option<Warning> {
    None
}
