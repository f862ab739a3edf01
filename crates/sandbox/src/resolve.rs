//! Symlink-aware path resolution that tolerates missing targets

use std::io;
use std::path::{Component, Path, PathBuf};

const MAX_SYMLINK_HOPS: u32 = 40;

/// Resolve `path` to an absolute path with every existing symlink followed.
///
/// Relative input is joined onto the current directory. Components that do
/// not exist are appended as-is and `..` after them is applied lexically, so a
/// missing target is never an error.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut hops = 0;
    resolve_from(PathBuf::new(), &absolute, &mut hops)
}

fn resolve_from(mut resolved: PathBuf, path: &Path, hops: &mut u32) -> io::Result<PathBuf> {
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => resolved = PathBuf::from(prefix.as_os_str()),
            Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                match std::fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        *hops += 1;
                        if *hops > MAX_SYMLINK_HOPS {
                            return Err(io::Error::new(
                                io::ErrorKind::Other,
                                format!("too many levels of symbolic links: {}", candidate.display()),
                            ));
                        }
                        // relative targets are relative to the link's directory
                        let target = std::fs::read_link(&candidate)?;
                        resolved = resolve_from(resolved, &target, hops)?;
                    }
                    _ => resolved = candidate,
                }
            }
        }
    }

    Ok(resolved)
}

/// Component-wise ancestor check; `path == root` counts as inside.
pub fn is_within(path: &Path, root: &Path) -> bool {
    let path_components: Vec<_> = path.components().collect();
    let root_components: Vec<_> = root.components().collect();

    if path_components.len() < root_components.len() {
        return false;
    }

    root_components
        .iter()
        .enumerate()
        .all(|(i, root_comp)| path_components.get(i) == Some(root_comp))
}
