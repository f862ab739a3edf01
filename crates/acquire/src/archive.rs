//! Blocking archive work: extraction, layout normalization and promotion.
//!
//! Everything here touches the filesystem synchronously and is meant to run
//! inside `spawn_blocking`.

use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::{AttemptError, REQUIRED_FILES, REQUIRED_PARTS};

/// Working paths for one code under a models root
#[derive(Debug, Clone)]
pub struct InstallPaths {
    pub archive: PathBuf,
    pub staging: PathBuf,
    pub assembly: PathBuf,
    pub bundle: PathBuf,
}

impl InstallPaths {
    pub fn new(root: &Path, code: &str) -> Self {
        Self {
            archive: root.join(format!("{code}.zip")),
            staging: root.join(format!("temp_{code}")),
            assembly: root.join(format!(".{code}.partial")),
            bundle: root.join(code),
        }
    }
}

/// Extract, assemble and promote a downloaded archive into `paths.bundle`
pub fn install(paths: &InstallPaths) -> Result<(), AttemptError> {
    reset_dir(&paths.staging)?;
    extract(&paths.archive, &paths.staging)?;

    let archive_root = archive_root(&paths.staging)?;
    debug!("archive root: {:?}", archive_root);

    reset_dir(&paths.assembly)?;
    for part in REQUIRED_PARTS {
        let src = archive_root.join(part);
        if !is_real_dir(&src) {
            warn!("archive has no '{}' directory", part);
            continue;
        }
        let dst = paths.assembly.join(part);
        fs::rename(&src, &dst).map_err(|e| AttemptError::io(&src, e))?;
    }

    promote(&paths.assembly, &paths.bundle)
}

/// Unpack `archive` into `dest`.
///
/// Entries whose names would land outside `dest` fail the extraction.
pub fn extract(archive: &Path, dest: &Path) -> Result<(), AttemptError> {
    let file = fs::File::open(archive).map_err(|e| AttemptError::io(archive, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    debug!("extracting {} entries into {:?}", zip.len(), dest);
    zip.extract(dest)?;
    Ok(())
}

/// Directory holding the bundle parts.
///
/// An archive that unpacks to a single directory is treated as wrapped and
/// that directory becomes the root.
pub fn archive_root(staging: &Path) -> Result<PathBuf, AttemptError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(staging).map_err(|e| AttemptError::io(staging, e))? {
        let entry = entry.map_err(|e| AttemptError::io(staging, e))?;
        entries.push(entry.path());
    }

    match entries.as_slice() {
        [only] if is_real_dir(only) => Ok(only.clone()),
        _ => Ok(staging.to_path_buf()),
    }
}

/// Replace `bundle` with the assembled directory
pub fn promote(assembly: &Path, bundle: &Path) -> Result<(), AttemptError> {
    remove_dir_if_exists(bundle)?;
    fs::rename(assembly, bundle).map_err(|e| AttemptError::io(bundle, e))?;
    debug!("promoted {:?}", bundle);
    Ok(())
}

/// Remove the scratch state of an attempt, logging what could not go
pub fn cleanup(paths: &InstallPaths) {
    for dir in [&paths.staging, &paths.assembly] {
        if let Err(e) = remove_dir_if_exists(dir) {
            warn!("failed to remove {:?}: {}", dir, e);
        }
    }
    if let Err(e) = remove_file_if_exists(&paths.archive) {
        warn!("failed to remove {:?}: {}", paths.archive, e);
    }
}

/// Required files absent from an installed bundle
pub fn missing_files(bundle: &Path) -> Vec<String> {
    REQUIRED_FILES
        .iter()
        .filter(|rel| !bundle.join(rel).is_file())
        .map(|rel| rel.to_string())
        .collect()
}

/// Whether `dir` exists and has at least one entry
pub fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

pub fn remove_file_if_exists(path: &Path) -> Result<(), AttemptError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AttemptError::io(path, e)),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<(), AttemptError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AttemptError::io(path, e)),
    }
}

fn reset_dir(path: &Path) -> Result<(), AttemptError> {
    remove_dir_if_exists(path)?;
    fs::create_dir_all(path).map_err(|e| AttemptError::io(path, e))
}

// symlinks never count, even when they point at a directory
fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
