use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where the written file takes its permission bits from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FileMode {
    /// Whatever the process umask yields for a new file.
    #[default]
    Default,
    /// Exact unix mode bits.
    Fixed(u32),
    /// The mode of an existing file, falling back to `Default` when it is absent.
    /// Rewriting a script in place keeps it executable this way.
    CopyFrom(PathBuf),
}

#[derive(Clone, Debug, Default)]
pub struct AtomicWriteOptions {
    pub mode: FileMode,
    pub sync: bool,
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = FileMode::Fixed(mode);
        self
    }

    pub fn mode_of(mut self, path: impl Into<PathBuf>) -> Self {
        self.mode = FileMode::CopyFrom(path.into());
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    #[cfg(unix)]
    fn resolve_mode(&self) -> Option<u32> {
        use std::os::unix::fs::PermissionsExt;
        match &self.mode {
            FileMode::Default => None,
            FileMode::Fixed(mode) => Some(*mode),
            FileMode::CopyFrom(path) => fs::metadata(path)
                .ok()
                .map(|meta| meta.permissions().mode() & 0o7777),
        }
    }
}

/// Write `content` to a hidden sibling and rename it over `path`.
///
/// Readers observe either the old content or the new content, never a partial file.
/// The sibling is opened with `create_new`, so a symlink planted at the temp name is
/// never followed, and it is removed again when any step fails.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(Error::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other("not a file path"),
        });
    };

    let tmp_path = parent.join(format!(
        ".{}.{}.keg-tmp",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    let staged = write_staged(&tmp_path, content, &options).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })
    });
    if staged.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    staged
}

fn write_staged(tmp_path: &Path, content: &[u8], options: &AtomicWriteOptions) -> Result<()> {
    let write_err = |e| Error::Write {
        path: tmp_path.to_path_buf(),
        source: e,
    };

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)
        .map_err(write_err)?;
    file.write_all(content).map_err(write_err)?;

    #[cfg(unix)]
    if let Some(mode) = options.resolve_mode() {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .map_err(write_err)?;
    }

    if options.sync {
        file.sync_all().map_err(write_err)?;
    }
    Ok(())
}
