//! Archive extraction with path sanitization and component stripping.
//!
//! - `format.rs` - format detection from magic bytes
//! - `sanitize.rs` - zip-slip prevention and `strip_components`
//! - `extract/` - per-format implementations
//!
//! Supported: `.tar`, `.tar.gz`, `.zip`. Anything else is
//! [`Error::UnsupportedFormat`].

pub use error::{Error, Result};
pub use extract::{extract_bytes, extract_from_reader};
pub use format::{ArchiveFormat, TarCompress, detect_format, detect_from_reader};
pub use options::ExtractOptions;
pub use report::{ArchiveReport, EntryKind, ExtractedEntry};
pub use sanitize::sanitize_entry;

mod error;
mod extract;
mod format;
mod options;
mod report;
mod sanitize;
