use std::path::PathBuf;

use bytes::Bytes;

/// What a source resolves to on the local machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    /// Archive bytes awaiting extraction, with the strip count that applies to them.
    Archive { bytes: Bytes, strip_components: usize },
    /// A directory that already holds the payload.
    Tree { path: PathBuf },
}
