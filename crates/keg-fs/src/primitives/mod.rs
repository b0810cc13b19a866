pub mod atomic_write;
pub mod ensure;
pub mod replace_dir;

pub use atomic_write::{AtomicWriteOptions, FileMode, atomic_write};
pub use ensure::{ensure_dir, ensure_symlink, remove_dir_if_exists};
pub use replace_dir::{ReplaceDirOptions, replace_dir};
