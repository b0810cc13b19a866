use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("invalid package name '{0}'")]
    InvalidName(String),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("unknown template variable '{{{name}}}' in '{template}'")]
    UnknownVariable { name: String, template: String },

    #[error("unclosed placeholder in '{0}'")]
    UnclosedPlaceholder(String),

    #[error("{inner} must not be inside {outer}")]
    PrefixOverlap { inner: PathBuf, outer: PathBuf },

    #[error("path '{0}' must be relative and stay inside its root")]
    EscapingPath(String),

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid formula: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ResourceError>;
