//! Validation against the allowed roots

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::resolve::{is_within, resolve_path};
use crate::roots::AllowedRootSet;
use crate::{Result, SandboxError, ESCAPES_BASE, ESCAPES_SANDBOX, NO_ROOTS};

/// An absolute, symlink-resolved path that was inside an allowed root when
/// it was validated.
///
/// The guarantee holds for the moment of validation only; the filesystem can
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath {
    path: PathBuf,
}

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl Deref for ResolvedPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves paths and rejects anything outside the configured roots
#[derive(Debug, Clone)]
pub struct PathSandbox {
    roots: AllowedRootSet,
}

impl PathSandbox {
    pub fn new(roots: AllowedRootSet) -> Self {
        Self { roots }
    }

    /// Build from unresolved root candidates
    pub fn from_roots<I, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::new(AllowedRootSet::new(candidates))
    }

    pub fn roots(&self) -> &AllowedRootSet {
        &self.roots
    }

    /// Resolve `raw` and require it to be under an existing root
    pub fn validate(&self, raw: impl AsRef<Path>) -> Result<ResolvedPath> {
        let raw = raw.as_ref();
        let resolved = resolve_path(raw)?;

        if self.roots.is_empty() {
            return Err(reject(NO_ROOTS, raw, resolved));
        }

        match self.roots.matching_root(&resolved) {
            Some(root) => {
                debug!("{:?} validated under root {:?}", resolved, root);
                Ok(ResolvedPath { path: resolved })
            }
            None => Err(reject(ESCAPES_SANDBOX, raw, resolved)),
        }
    }

    /// `sanitize_join` followed by root validation
    pub fn join(&self, base: impl AsRef<Path>, segment: impl AsRef<Path>) -> Result<ResolvedPath> {
        let joined = sanitize_join(base, segment)?;
        self.validate(joined)
    }
}

/// Join an untrusted `segment` onto `base`, failing when the result leaves
/// `base`.
///
/// Catches `..` traversal, absolute overrides and symlinks pointing out of
/// `base`. Does not check any sandbox roots.
pub fn sanitize_join(base: impl AsRef<Path>, segment: impl AsRef<Path>) -> Result<PathBuf> {
    let base = base.as_ref();
    let segment = segment.as_ref();
    let joined = base.join(segment);

    let resolved_base = resolve_path(base)?;
    let resolved = resolve_path(&joined)?;

    if !is_within(&resolved, &resolved_base) {
        return Err(reject(ESCAPES_BASE, &joined, resolved));
    }

    Ok(resolved)
}

fn reject(reason: &'static str, raw: &Path, resolved: PathBuf) -> SandboxError {
    error!(
        resolved = %resolved.display(),
        raw = %raw.display(),
        "security violation: {}",
        reason
    );
    SandboxError::SecurityViolation {
        reason,
        path: resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sandbox_in(dir: &TempDir) -> (PathSandbox, PathBuf) {
        let root = dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        (PathSandbox::from_roots([&root]), root.canonicalize().unwrap())
    }

    #[test]
    fn test_validate_inside() {
        let dir = TempDir::new().unwrap();
        let (sandbox, root) = sandbox_in(&dir);
        let file = root.join("test.txt");
        fs::write(&file, "content").unwrap();

        let resolved = sandbox.validate(&file).unwrap();
        assert_eq!(resolved.as_path(), file.canonicalize().unwrap());
    }

    #[test]
    fn test_validate_root_itself() {
        let dir = TempDir::new().unwrap();
        let (sandbox, root) = sandbox_in(&dir);

        assert_eq!(sandbox.validate(&root).unwrap().as_path(), root);
    }

    #[test]
    fn test_validate_outside() {
        let dir = TempDir::new().unwrap();
        let (sandbox, _root) = sandbox_in(&dir);

        let err = sandbox.validate(dir.path().join("outside.txt")).unwrap_err();
        match err {
            SandboxError::SecurityViolation { reason, .. } => assert_eq!(reason, ESCAPES_SANDBOX),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_with_no_roots() {
        let sandbox = PathSandbox::new(AllowedRootSet::default());

        let err = sandbox.validate("/tmp").unwrap_err();
        assert!(err.to_string().contains(NO_ROOTS));
    }

    #[test]
    fn test_violation_reports_resolved_path() {
        let dir = TempDir::new().unwrap();
        let (sandbox, root) = sandbox_in(&dir);

        let err = sandbox.validate(root.join("a/../../escape")).unwrap_err();
        match err {
            SandboxError::SecurityViolation { path, .. } => {
                assert_eq!(path, root.parent().unwrap().join("escape"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sanitize_join_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let (_sandbox, root) = sandbox_in(&dir);

        let err = sanitize_join(&root, "../../etc/passwd").unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn test_sanitize_join_rejects_absolute_segment() {
        let dir = TempDir::new().unwrap();
        let (_sandbox, root) = sandbox_in(&dir);

        assert!(sanitize_join(&root, "/etc/passwd").is_err());
    }

    #[test]
    fn test_sanitize_join_accepts_inner_dotdot() {
        let dir = TempDir::new().unwrap();
        let (_sandbox, root) = sandbox_in(&dir);

        let joined = sanitize_join(&root, "a/../b.txt").unwrap();
        assert_eq!(joined, root.join("b.txt"));
    }

    #[test]
    fn test_join_checks_roots_too() {
        let dir = TempDir::new().unwrap();
        let (sandbox, _root) = sandbox_in(&dir);

        // inside its base but the base itself is outside the sandbox
        let err = sandbox.join(dir.path(), "file.txt").unwrap_err();
        match err {
            SandboxError::SecurityViolation { reason, .. } => assert_eq!(reason, ESCAPES_SANDBOX),
            other => panic!("unexpected error: {other}"),
        }
    }
}
