use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Exclusive advisory lock held for the lifetime of the value.
///
/// Two installs targeting the same prefix take the same lock file, so their
/// writes never interleave.
#[derive(Debug)]
pub struct PrefixLock {
    file: File,
    path: PathBuf,
}

impl PrefixLock {
    fn open(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::Write {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Block until the lock is acquired.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Self::open(&path)?;
        FileExt::lock_exclusive(&file).map_err(|e| Error::Lock {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "acquired prefix lock");
        Ok(Self { file, path })
    }

    /// Acquire the lock or fail immediately with [`Error::Locked`].
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Self::open(&path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(Error::Locked { path })
            }
            Err(e) => Err(Error::Lock { path, source: e }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PrefixLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
