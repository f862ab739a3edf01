//! Path sandbox for untrusted path fragments
//!
//! Resolves user- or config-supplied paths to absolute, symlink-free paths and
//! rejects any result that is not under one of the allowed roots.

use std::path::PathBuf;
use thiserror::Error;

pub mod resolve;
pub mod roots;
pub mod sandbox;

pub use resolve::{is_within, resolve_path};
pub use roots::AllowedRootSet;
pub use sandbox::{sanitize_join, PathSandbox, ResolvedPath};

/// Reason reported when the root set is empty
pub const NO_ROOTS: &str = "no valid sandbox roots configured";

/// Reason reported when a path resolves outside every root
pub const ESCAPES_SANDBOX: &str = "path escapes sandbox";

/// Reason reported when a joined segment leaves its base directory
pub const ESCAPES_BASE: &str = "path escapes base directory";

/// Sandbox failures
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("security violation: {reason}: {}", path.display())]
    SecurityViolation { reason: &'static str, path: PathBuf },

    #[error("path resolution failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// True for rejections, false for resolution failures
    pub fn is_violation(&self) -> bool {
        matches!(self, SandboxError::SecurityViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
