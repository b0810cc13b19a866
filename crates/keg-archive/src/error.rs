use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("zip-slip attack detected: entry '{entry}' resolves outside the destination")]
    ZipSlip { entry: PathBuf },

    #[error("symlink target escapes base directory: '{target}' in '{symlink}'")]
    SymlinkEscape { target: PathBuf, symlink: PathBuf },

    #[error("symlink target is absolute path: '{target}' in '{symlink}'")]
    AbsoluteSymlinkTarget { target: PathBuf, symlink: PathBuf },

    #[error("entry path is invalid")]
    InvalidPath,

    #[error("archive is corrupted: {0}")]
    Corrupted(String),

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to create symlink {link} -> {target}: {source}")]
    SymlinkCreationFailed {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error("extraction cancelled")]
    Cancelled,

    #[error("extraction did not finish within {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
