use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

const MAX_LINK_HOPS: usize = 40;

/// Resolve an archive entry path to a path relative to the destination.
///
/// Returns `None` when stripping consumes the whole path (the `pkg-1.0/`
/// directory itself under `strip_components = 1`).
pub fn sanitize_entry(entry: &Path, strip_components: usize) -> Result<Option<PathBuf>> {
    let normalized = normalize(entry)?;
    let remaining: PathBuf = normalized.components().skip(strip_components).collect();
    if remaining.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(remaining))
    }
}

/// A symlink at `link` (relative to the destination) may only point inside the destination.
pub fn check_symlink_target(target: &Path, link: &Path) -> Result<()> {
    if target.has_root() {
        return Err(Error::AbsoluteSymlinkTarget {
            target: target.to_path_buf(),
            symlink: link.to_path_buf(),
        });
    }
    let base = link.parent().unwrap_or(Path::new(""));
    normalize(&base.join(target)).map_err(|_| Error::SymlinkEscape {
        target: target.to_path_buf(),
        symlink: link.to_path_buf(),
    })?;
    Ok(())
}

/// Follow `relative` through the symlinks already on disk under `root`.
///
/// Returns the equivalent path relative to `root` with every existing link
/// expanded. Any step that would leave `root` is a [`Error::SymlinkEscape`]
/// blamed on `entry`, so chains of individually harmless links are caught.
pub(crate) fn resolve_within(root: &Path, relative: &Path, entry: &Path) -> Result<PathBuf> {
    let escape = || Error::SymlinkEscape {
        target: relative.to_path_buf(),
        symlink: entry.to_path_buf(),
    };

    let mut pending = Vec::new();
    push_reversed(&mut pending, relative).map_err(|_| escape())?;
    let mut resolved = PathBuf::new();
    let mut hops = 0;

    while let Some(part) = pending.pop() {
        if part == ".." {
            if !resolved.pop() {
                return Err(escape());
            }
            continue;
        }
        resolved.push(&part);

        let on_disk = root.join(&resolved);
        let is_link = fs::symlink_metadata(&on_disk).is_ok_and(|m| m.file_type().is_symlink());
        if !is_link {
            continue;
        }
        hops += 1;
        if hops > MAX_LINK_HOPS {
            return Err(escape());
        }
        let target = fs::read_link(&on_disk)?;
        if target.has_root() {
            return Err(Error::AbsoluteSymlinkTarget {
                target,
                symlink: resolved,
            });
        }
        resolved.pop();
        push_reversed(&mut pending, &target).map_err(|_| escape())?;
    }
    Ok(resolved)
}

/// Queue the components of `path` so that popping yields them in order.
fn push_reversed(pending: &mut Vec<OsString>, path: &Path) -> Result<()> {
    for component in path.components().rev() {
        match component {
            Component::Normal(part) => pending.push(part.to_os_string()),
            Component::ParentDir => pending.push(OsString::from("..")),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return Err(Error::InvalidPath),
        }
    }
    Ok(())
}

/// Lexically normalize a relative path, refusing anything that climbs out of it.
fn normalize(path: &Path) -> Result<PathBuf> {
    if path.to_string_lossy().contains('\0') {
        return Err(Error::InvalidPath);
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Error::ZipSlip {
                        entry: path.to_path_buf(),
                    });
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::ZipSlip {
                    entry: path.to_path_buf(),
                });
            }
        }
    }
    Ok(parts.iter().collect())
}
