use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InstallError>;

/// Errors raised by [`InstallHook`](crate::InstallHook) implementations.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// The working stages of an installation, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Validation and lock acquisition, before any work starts.
    Pending,
    Fetching,
    Extracting,
    Planning,
    Rewriting,
    Finalizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Planning => "planning",
            Self::Rewriting => "rewriting",
            Self::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Terminal error of an installation. Every variant maps to exactly one
/// [`Stage`]; the source chain carries the underlying cause.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid package description")]
    Resource(#[from] keg_resource::ResourceError),

    #[error("fetching failed")]
    Fetch(#[from] keg_fetch::FetchError),

    #[error("extracting failed")]
    Extract(#[from] keg_archive::Error),

    #[error("planning failed")]
    Layout(#[from] keg_layout::LayoutError),

    #[error("rewriting failed")]
    Rewrite(#[from] keg_rewrite::RewriteError),

    #[error("cannot derive service descriptor")]
    Service(#[from] keg_service::ServiceError),

    #[error("filesystem operation failed while {stage}")]
    Fs {
        stage: Stage,
        #[source]
        source: keg_fs::Error,
    },

    #[error("i/o error on {path} while {stage}")]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot render {what}")]
    Template {
        what: &'static str,
        #[source]
        source: keg_resource::ResourceError,
    },

    #[error("runtime directory {path} lies inside the prefix {prefix}")]
    RuntimeDirInPrefix { path: PathBuf, prefix: PathBuf },

    #[error("invalid manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {path} belongs to `{found}`, not `{expected}`")]
    ManifestMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("cancelled while {0}")]
    Cancelled(Stage),

    #[error("`{0}` is not installed")]
    NotInstalled(String),
}

impl InstallError {
    pub(crate) fn fs(stage: Stage) -> impl FnOnce(keg_fs::Error) -> Self {
        move |source| Self::Fs { stage, source }
    }

    pub(crate) fn io(stage: Stage, path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            stage,
            path,
            source,
        }
    }

    /// Stage in which the error was raised.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Resource(_) | Self::NotInstalled(_) => Stage::Pending,
            Self::Fetch(_) => Stage::Fetching,
            Self::Extract(_) => Stage::Extracting,
            Self::Layout(_) => Stage::Planning,
            Self::Rewrite(_) => Stage::Rewriting,
            Self::Service(_)
            | Self::Template { .. }
            | Self::RuntimeDirInPrefix { .. }
            | Self::Manifest { .. }
            | Self::ManifestMismatch { .. } => Stage::Finalizing,
            Self::Fs { stage, .. } | Self::Io { stage, .. } | Self::Cancelled(stage) => *stage,
        }
    }

    /// True when the caller asked for the abort, including cancellation
    /// observed inside the fetcher or the extractor.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled(_)
                | Self::Fetch(keg_fetch::FetchError::Cancelled)
                | Self::Extract(keg_archive::Error::Cancelled)
        )
    }
}
