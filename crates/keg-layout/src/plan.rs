use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keg_resource::{Anchor, FileClass, InstallationPrefix};

/// A staged file and where it goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedFile {
    /// Path relative to the staging root.
    pub source: PathBuf,
    pub class: FileClass,
    pub anchor: Anchor,
    /// Path relative to the anchor directory.
    pub target: PathBuf,
    /// Index of the rule that classified the file.
    pub rule: usize,
}

impl PlannedFile {
    pub fn destination(&self, prefix: &InstallationPrefix) -> PathBuf {
        prefix.anchor_dir(self.anchor).join(&self.target)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Matched an exclusion rule for the named platform.
    Excluded(String),
    /// No rule matched and the planner is lenient.
    Unclassified,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedFile {
    pub source: PathBuf,
    pub reason: DropReason,
}

/// Placement decision for every file of a staging tree. Each staged file is in
/// exactly one of `files` or `dropped`, both sorted by source path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutPlan {
    pub files: Vec<PlannedFile>,
    pub dropped: Vec<DroppedFile>,
}

impl LayoutPlan {
    /// Source → (anchor, target) view, convenient for comparing plans.
    pub fn mapping(&self) -> BTreeMap<&Path, (Anchor, &Path)> {
        self.files
            .iter()
            .map(|f| (f.source.as_path(), (f.anchor, f.target.as_path())))
            .collect()
    }

    pub fn anchored(&self, anchor: Anchor) -> impl Iterator<Item = &PlannedFile> {
        self.files.iter().filter(move |f| f.anchor == anchor)
    }

    pub fn find(&self, source: impl AsRef<Path>) -> Option<&PlannedFile> {
        let source = source.as_ref();
        self.files.iter().find(|f| f.source == source)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
