//! Model bundle acquisition
//!
//! Downloads a zipped model bundle, extracts it into a staging directory,
//! normalizes the archive layout and promotes the required parts into
//! `<models_root>/<code>/`. Repeated calls for an installed code are free.

use modelvault_storage::{SandboxError, StorageError};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod archive;
pub mod bundle;
pub mod pipeline;
pub mod source;

pub use bundle::{AcquireReport, AttemptOutcome, DownloadAttempt, ModelBundle};
pub use pipeline::{ModelAcquisitionPipeline, RetryPolicy};
pub use source::{BundleSource, HttpBundleSource};

/// Sub-directories copied out of the archive; everything else is dropped
pub const REQUIRED_PARTS: [&str; 4] = ["am", "conf", "graph", "ivector"];

/// Files checked after installation
pub const REQUIRED_FILES: [&str; 6] = [
    "am/final.mdl",
    "conf/model.conf",
    "graph/phones/word_boundary.int",
    "graph/Gr.fst",
    "graph/HCLr.fst",
    "ivector/final.ie",
];

/// Failure of a single download-and-install attempt
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("download stalled: no data for {0:?}")]
    Stalled(std::time::Duration),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AttemptError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        AttemptError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Acquisition failures surfaced to callers
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Security(#[from] SandboxError),

    #[error("failed to acquire model '{code}' after {attempts} attempts: {source}")]
    Acquisition {
        code: String,
        attempts: u32,
        #[source]
        source: AttemptError,
    },
}

impl From<StorageError> for AcquireError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Security(e) => AcquireError::Security(e),
            other => AcquireError::Storage(other),
        }
    }
}

impl AcquireError {
    /// True when the destination was rejected by the sandbox
    pub fn is_security_violation(&self) -> bool {
        matches!(self, AcquireError::Security(e) if e.is_violation())
    }
}

pub type Result<T> = std::result::Result<T, AcquireError>;
