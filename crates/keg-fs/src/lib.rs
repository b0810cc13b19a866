//! Filesystem primitives for keg installations.
//!
//! - [`Workspace`] - a staging tree that is removed unless explicitly released
//! - [`PrefixLock`] - exclusive lock file serializing installs into one prefix
//! - [`primitives`] - atomic writes, idempotent directories and symlinks, directory promotion

mod error;
mod lock;
pub mod primitives;
mod workspace;

pub use error::{Error, Result};
pub use lock::PrefixLock;
pub use primitives::{
    AtomicWriteOptions, FileMode, ReplaceDirOptions, atomic_write, ensure_dir, ensure_symlink,
    remove_dir_if_exists, replace_dir,
};
pub use workspace::Workspace;
