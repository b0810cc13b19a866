use std::path::{Path, PathBuf};

use keg_layout::{DropReason, LayoutPlan};
use keg_resource::{Anchor, FileClass, InstallationPrefix, PackageSpec};
use serde::{Deserialize, Serialize};

use crate::error::{InstallError, Result, Stage};

pub const MANIFEST_FILE: &str = "INSTALL_MANIFEST.json";

/// One staged file and the path it was installed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub installed: PathBuf,
    pub anchor: Anchor,
    pub class: FileClass,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedEntry {
    pub source: PathBuf,
    pub reason: String,
}

/// Durable record of a completed installation, stored inside the prefix.
///
/// Contains no timestamps: installing the same package twice yields the same
/// bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub install_id: String,
    pub prefix: PathBuf,
    pub config_root: PathBuf,
    pub var_root: PathBuf,
    /// Ordered by source path.
    pub files: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedEntry>,
    /// Directories created by post-install steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_link: Option<PathBuf>,
}

impl Manifest {
    pub(crate) fn new(spec: &PackageSpec, prefix: &InstallationPrefix, install_id: &str) -> Self {
        Self {
            name: spec.name.clone(),
            version: spec.version.clone(),
            install_id: install_id.to_owned(),
            prefix: prefix.prefix().to_path_buf(),
            config_root: prefix.config_root().to_path_buf(),
            var_root: prefix.var_root().to_path_buf(),
            files: Vec::new(),
            dropped: Vec::new(),
            directories: Vec::new(),
            config_link: None,
        }
    }

    pub(crate) fn record_dropped(&mut self, plan: &LayoutPlan) {
        self.dropped = plan
            .dropped
            .iter()
            .map(|d| DroppedEntry {
                source: d.source.clone(),
                reason: match &d.reason {
                    DropReason::Excluded(platform) => format!("excluded: {platform}"),
                    DropReason::Unclassified => "unclassified".to_owned(),
                },
            })
            .collect();
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self).map_err(|source| InstallError::Manifest {
            path: self.prefix.join(MANIFEST_FILE),
            source,
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(InstallError::io(Stage::Pending, path))?;
        serde_json::from_slice(&bytes).map_err(|source| InstallError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}
