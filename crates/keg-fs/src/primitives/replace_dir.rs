use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct ReplaceDirOptions {
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for ReplaceDirOptions {
    fn default() -> Self {
        Self {
            retry_count: 5,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl ReplaceDirOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Move the directory `src` to `dest`, replacing whatever is at `dest`.
///
/// An existing `dest` is first renamed aside and only deleted once `src` is in
/// place; if the final rename fails the previous tree is restored.
pub fn replace_dir(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: ReplaceDirOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let backup = if dest.exists() {
        let backup = backup_path(dest);
        rename_with_retry(dest, &backup, options)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = rename_with_retry(src, dest, options) {
        if let Some(backup) = &backup {
            let _ = std::fs::rename(backup, dest);
        }
        return Err(e);
    }

    if let Some(backup) = backup {
        if let Err(e) = std::fs::remove_dir_all(&backup) {
            tracing::warn!(path = %backup.display(), error = %e, "failed to remove replaced directory");
        }
    }

    Ok(())
}

fn backup_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.{}.keg-old", uuid::Uuid::new_v4()))
}

fn rename_with_retry(from: &Path, to: &Path, options: ReplaceDirOptions) -> Result<()> {
    let mut attempts = 0;
    loop {
        match std::fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempts += 1;
                if attempts >= options.retry_count.max(1) {
                    return Err(Error::ReplaceDir {
                        path: to.to_path_buf(),
                        source: e,
                    });
                }
                std::thread::sleep(options.retry_delay * attempts);
            }
        }
    }
}
