//! Trusted root directories

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::resolve::{is_within, resolve_path};

/// Ordered set of resolved trust boundaries.
///
/// Candidates are resolved when the set is built. A root that does not exist
/// stays in the set but never matches.
#[derive(Debug, Clone, Default)]
pub struct AllowedRootSet {
    roots: Vec<PathBuf>,
}

impl AllowedRootSet {
    /// Resolve each candidate, dropping duplicates and unresolvable entries
    pub fn new<I, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut roots: Vec<PathBuf> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.as_ref();
            match resolve_path(candidate) {
                Ok(root) => {
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
                Err(e) => warn!("dropping sandbox root {:?}: {}", candidate, e),
            }
        }
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(PathBuf::as_path)
    }

    /// First root that currently exists and contains `resolved`
    pub fn matching_root(&self, resolved: &Path) -> Option<&Path> {
        self.iter()
            .filter(|root| root.is_dir())
            .find(|root| is_within(resolved, root))
    }
}
