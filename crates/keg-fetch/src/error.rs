use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The downloaded bytes do not hash to the declared digest.
    #[error("integrity check failed for {url}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to fetch {url}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unsupported source url: {0}")]
    UnsupportedUrl(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Fs(#[from] keg_fs::Error),
}

/// Failure of the external tooling behind a version-control source.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("required build tool `{name}` not found on PATH")]
    ToolNotFound { name: String },

    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },

    #[error("build produced no artifact matching `{pattern}` under {dir}")]
    ArtifactNotFound { pattern: String, dir: PathBuf },

    #[error("invalid artifact pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
