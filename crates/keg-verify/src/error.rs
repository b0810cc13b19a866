use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("invalid checksum '{0}': expected 'sha256:<64 hex digits>'")]
    InvalidChecksum(String),

    #[error("unsupported checksum algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerificationError>;
