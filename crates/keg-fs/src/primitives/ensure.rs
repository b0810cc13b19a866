//! Idempotent placement helpers. Re-running any of these against their own
//! output is a no-op.

use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Create `path` and its parents. An existing directory is not an error.
///
/// Returns `true` if the directory was created.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(false),
        Ok(_) => Err(Error::Occupied {
            path: path.to_path_buf(),
            expected: "directory",
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| Error::CreateDir {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(true)
        }
        Err(e) => Err(Error::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Make `link` a symlink pointing at `target`.
///
/// A link that already points at `target` is left alone; a link pointing
/// elsewhere is swapped atomically. Any non-link occupant is an error.
/// Returns `true` if the link was created or changed.
pub fn ensure_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<bool> {
    let target = target.as_ref();
    let link = link.as_ref();

    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(link).map_err(|e| Error::Read {
                path: link.to_path_buf(),
                source: e,
            })?;
            if current == target {
                return Ok(false);
            }
            let tmp = link.with_file_name(format!(".tmp.{}.keg-link", uuid::Uuid::new_v4()));
            symlink(target, &tmp)?;
            fs::rename(&tmp, link).map_err(|e| {
                let _ = fs::remove_file(&tmp);
                Error::Symlink {
                    target: target.to_path_buf(),
                    link: link.to_path_buf(),
                    source: e,
                }
            })?;
            Ok(true)
        }
        Ok(_) => Err(Error::Occupied {
            path: link.to_path_buf(),
            expected: "symlink",
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = link.parent() {
                ensure_dir(parent)?;
            }
            symlink(target, link)?;
            Ok(true)
        }
        Err(e) => Err(Error::Read {
            path: link.to_path_buf(),
            source: e,
        }),
    }
}

/// Remove a directory tree, treating a missing directory as already removed.
pub fn remove_dir_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);

    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };

    result.map_err(|e| Error::Symlink {
        target: target.to_path_buf(),
        link: link.to_path_buf(),
        source: e,
    })
}
