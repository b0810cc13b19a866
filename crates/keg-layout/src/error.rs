use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid layout pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("layout rule {rule} has an invalid target directory `{into}`")]
    InvalidTarget { rule: usize, into: String },

    /// Raised only under [`UnmatchedPolicy::Strict`](crate::UnmatchedPolicy::Strict).
    #[error("no layout rule classifies {0}")]
    Unclassified(PathBuf),

    #[error("rule {rule} strips {strip} components from {source_path}, leaving nothing")]
    StripTooFar {
        source_path: PathBuf,
        rule: usize,
        strip: usize,
    },

    #[error("{first} and {second} both map to {target}")]
    Collision {
        target: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{source_path} would be installed over reserved path {target}")]
    Reserved { source_path: PathBuf, target: PathBuf },

    #[error("failed to walk staging tree")]
    Walk(#[from] walkdir::Error),
}
