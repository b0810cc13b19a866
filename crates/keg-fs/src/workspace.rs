use crate::primitives::{ReplaceDirOptions, replace_dir};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// A uniquely named staging directory.
///
/// The directory and everything in it is removed when the workspace is dropped,
/// whether the install succeeded, failed or was cancelled. Subtrees that should
/// outlive the workspace are moved out with [`Workspace::promote`].
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    closed: bool,
}

impl Workspace {
    /// Create a fresh workspace under `parent`.
    pub fn new(parent: impl AsRef<Path>) -> Result<Self> {
        let root = parent
            .as_ref()
            .join(format!("stage-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).map_err(|e| Error::CreateDir {
            path: root.clone(),
            source: e,
        })?;
        tracing::debug!(path = %root.display(), "created staging workspace");
        Ok(Self { root, closed: false })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of a subdirectory, created on demand.
    pub fn subdir(&self, name: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.root.join(name);
        std::fs::create_dir_all(&path).map_err(|e| Error::CreateDir {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Move `relative` out of the workspace so that it becomes `destination`.
    pub fn promote(&self, relative: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<()> {
        replace_dir(
            self.root.join(relative),
            destination,
            ReplaceDirOptions::default(),
        )
    }

    /// Remove the workspace now and report failures instead of swallowing them.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        std::fs::remove_dir_all(&self.root).map_err(|e| Error::Remove {
            path: self.root.clone(),
            source: e,
        })
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to clean staging workspace");
            }
        }
    }
}
