//! Moving planned files into staged prefix/config trees and installing config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keg_fs::{AtomicWriteOptions, Workspace};
use keg_layout::LayoutPlan;
use keg_resource::{Anchor, InstallationPrefix};

use crate::error::{InstallError, Result, Stage};

/// Staged copies of the prefix and config trees inside a workspace.
pub(crate) struct StagedRoots {
    pub(crate) prefix: PathBuf,
    pub(crate) config: PathBuf,
}

impl StagedRoots {
    pub(crate) const PREFIX: &'static str = "prefix";
    const CONFIG: &'static str = "config";

    pub(crate) fn create(workspace: &Workspace) -> Result<Self> {
        let prefix = workspace
            .subdir(Self::PREFIX)
            .map_err(InstallError::fs(Stage::Planning))?;
        let config = workspace
            .subdir(Self::CONFIG)
            .map_err(InstallError::fs(Stage::Planning))?;
        Ok(Self { prefix, config })
    }

    pub(crate) fn root(&self, anchor: Anchor) -> PathBuf {
        match anchor {
            Anchor::Prefix => self.prefix.clone(),
            Anchor::Config => self.config.clone(),
        }
    }

    /// Move every planned file from `tree` to its staged target.
    pub(crate) fn populate(&self, plan: &LayoutPlan, tree: &Path) -> Result<()> {
        for file in &plan.files {
            let from = tree.join(&file.source);
            let to = self.root(file.anchor).join(&file.target);
            if let Some(parent) = to.parent() {
                keg_fs::ensure_dir(parent).map_err(InstallError::fs(Stage::Planning))?;
            }
            std::fs::rename(&from, &to).map_err(InstallError::io(Stage::Planning, &from))?;
        }
        Ok(())
    }

    /// Copy staged configuration into the live config root.
    ///
    /// A file the user changed is left alone; the new version is written next
    /// to it as `<file>.default`. Everything written is recorded in the
    /// returned [`LiveChanges`] so it can be undone if the prefix is never
    /// promoted.
    pub(crate) fn install_config(
        &self,
        plan: &LayoutPlan,
        prefix: &InstallationPrefix,
    ) -> Result<LiveChanges> {
        let mut live = LiveChanges::default();
        live.create_dir(prefix.config_root())?;

        for file in plan.anchored(Anchor::Config) {
            let staged = self.config.join(&file.target);
            let destination = file.destination(prefix);
            let content =
                std::fs::read(&staged).map_err(InstallError::io(Stage::Finalizing, &staged))?;

            let written = match std::fs::read(&destination) {
                Ok(existing) if existing == content => destination,
                Ok(_) => {
                    let default = with_suffix(&destination, ".default");
                    tracing::warn!(
                        config = %destination.display(),
                        default = %default.display(),
                        "keeping modified configuration"
                    );
                    live.write(&default, &content, &staged)?;
                    live.preserved.push(default.clone());
                    default
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if let Some(parent) = destination.parent() {
                        live.create_dir(parent)?;
                    }
                    live.write(&destination, &content, &staged)?;
                    destination
                }
                Err(e) => return Err(InstallError::io(Stage::Finalizing, &destination)(e)),
            };
            live.config.insert(file.source.clone(), written);
        }

        Ok(live)
    }
}

/// Files and directories created outside the staging workspace ahead of
/// promotion. Dropping it without [`LiveChanges::commit`] undoes them:
/// new files and directories are removed, overwritten files get their
/// previous content back.
#[derive(Default)]
pub(crate) struct LiveChanges {
    /// Installed path per config source file.
    pub(crate) config: BTreeMap<PathBuf, PathBuf>,
    pub(crate) preserved: Vec<PathBuf>,
    files: Vec<(PathBuf, Option<Vec<u8>>)>,
    dirs: Vec<PathBuf>,
    committed: bool,
}

impl LiveChanges {
    pub(crate) fn create_dir(&mut self, dir: &Path) -> Result<()> {
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && p.symlink_metadata().is_err())
            .map(Path::to_path_buf)
            .collect();
        if keg_fs::ensure_dir(dir).map_err(InstallError::fs(Stage::Finalizing))? {
            tracing::debug!(dir = %dir.display(), "created directory");
        }
        self.dirs.extend(missing);
        Ok(())
    }

    fn write(&mut self, path: &Path, content: &[u8], mode_from: &Path) -> Result<()> {
        let previous = match std::fs::read(path) {
            Ok(previous) => Some(previous),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(InstallError::io(Stage::Finalizing, path)(e)),
        };
        keg_fs::atomic_write(path, content, AtomicWriteOptions::new().mode_of(mode_from))
            .map_err(InstallError::fs(Stage::Finalizing))?;
        self.files.push((path.to_path_buf(), previous));
        Ok(())
    }

    /// Keep everything; returns the `.default` files written.
    pub(crate) fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        std::mem::take(&mut self.preserved)
    }
}

impl Drop for LiveChanges {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (path, previous) in self.files.drain(..).rev() {
            match previous {
                Some(content) => {
                    let options = AtomicWriteOptions::new().mode_of(&path);
                    if let Err(e) = keg_fs::atomic_write(&path, &content, options) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to restore file");
                    }
                }
                None => match std::fs::remove_file(&path) {
                    Ok(()) => tracing::debug!(path = %path.display(), "removed"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove file")
                    }
                },
            }
        }
        // deepest first, so parents are empty by the time they are reached
        self.dirs
            .sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in &self.dirs {
            if let Err(e) = std::fs::remove_dir(dir) {
                tracing::debug!(dir = %dir.display(), error = %e, "left directory in place");
            }
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}
