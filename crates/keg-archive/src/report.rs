use std::path::PathBuf;

use crate::format::ArchiveFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Path as stored in the archive.
    pub original_path: PathBuf,
    /// Path relative to the destination after stripping.
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct ArchiveReport {
    pub format: ArchiveFormat,
    pub entries: Vec<ExtractedEntry>,
    /// Entries consumed entirely by component stripping, or of a type that is not extracted.
    pub skipped: usize,
    pub total_bytes: u64,
}

impl ArchiveReport {
    pub(crate) fn new(format: ArchiveFormat) -> Self {
        Self {
            format,
            entries: Vec::new(),
            skipped: 0,
            total_bytes: 0,
        }
    }

    pub(crate) fn push(&mut self, entry: ExtractedEntry) {
        self.total_bytes += entry.size;
        self.entries.push(entry);
    }

    pub fn files(&self) -> impl Iterator<Item = &ExtractedEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }
}
