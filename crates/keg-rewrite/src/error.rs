use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RewriteError>;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewrite rule {rule}: invalid pattern")]
    InvalidPattern {
        rule: usize,
        #[source]
        source: regex::Error,
    },

    #[error("rewrite rule {rule}: empty pattern")]
    EmptyPattern { rule: usize },

    #[error("rewrite rule {rule}: cannot render template")]
    Template {
        rule: usize,
        #[source]
        source: keg_resource::ResourceError,
    },

    /// A mandatory rule found neither its pattern nor its rendered replacement.
    #[error("rewrite rule {rule}: pattern `{pattern}` not found in {file}")]
    PatternNotFound {
        file: PathBuf,
        rule: usize,
        pattern: String,
    },

    #[error("rewrite rule {rule}: cannot read {path}")]
    Read {
        rule: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] keg_fs::Error),
}
