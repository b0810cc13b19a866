use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to link {link} -> {target}: {source}")]
    Symlink {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error("failed to replace {path}: {source}")]
    ReplaceDir { path: PathBuf, source: io::Error },

    #[error("{path} already exists and is not a {expected}")]
    Occupied { path: PathBuf, expected: &'static str },

    #[error("{path} is locked by another process")]
    Locked { path: PathBuf },

    #[error("failed to lock {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
