//! Storage layout: data roots, capability gating, directory provisioning and
//! temp reclamation.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod gate;
pub mod profile;
pub mod provisioner;
pub mod reclaim;
pub mod store;

pub use gate::{
    await_grant_result, ensure_storage_access, Capability, PollSettings, RequestId,
    StorageCapabilityGate, UnrestrictedGate,
};
pub use modelvault_sandbox::{PathSandbox, ResolvedPath, SandboxError};
pub use profile::{profile_from_config, DesktopProfile, RestrictedProfile, StorageProfile};
pub use provisioner::{DirectoryProvisioner, TempDirectory};
pub use reclaim::{ReclaimReport, TempLifecycleManager};
pub use store::FileStore;

/// Storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Security(#[from] SandboxError),

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A best-effort step that did not take effect.
///
/// Returned alongside successful results instead of failing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub path: PathBuf,
    pub message: String,
}

impl Warning {
    pub fn new(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}
