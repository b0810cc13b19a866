use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{PackageSpec, ResourceError, Result};

/// The two trees a staged file can be installed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// The immutable payload tree, replaced wholesale on upgrade.
    Prefix,
    /// The editable configuration root, which survives upgrades.
    Config,
}

/// Directories owned by one installed package.
///
/// The prefix holds the immutable payload. Configuration and runtime state live
/// outside it so that replacing the prefix never destroys user edits or data;
/// `<prefix>/config` links back to the configuration root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationPrefix {
    root: PathBuf,
    prefix: PathBuf,
    config_root: PathBuf,
    var_root: PathBuf,
    package: String,
}

impl InstallationPrefix {
    /// Standard layout under `root`:
    ///
    /// ```text
    /// <root>/cellar/<name>/<version>   prefix
    /// <root>/etc/<name>                configuration root
    /// <root>/var/<name>                data, log, plugins
    /// <root>/.keg                      staging and locks
    /// ```
    pub fn new(root: impl Into<PathBuf>, spec: &PackageSpec) -> Result<Self> {
        spec.validate()?;
        let root = root.into();
        Self::with_paths(
            &root,
            &spec.name,
            Self::package_dir(&root, &spec.name).join(&spec.version),
            root.join("etc").join(&spec.name),
            root.join("var").join(&spec.name),
        )
    }

    /// Explicit locations. Fails if the runtime or configuration roots overlap the prefix.
    pub fn with_paths(
        root: impl Into<PathBuf>,
        package: &str,
        prefix: impl Into<PathBuf>,
        config_root: impl Into<PathBuf>,
        var_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let this = Self {
            root: root.into(),
            prefix: prefix.into(),
            config_root: config_root.into(),
            var_root: var_root.into(),
            package: package.to_owned(),
        };
        this.check_disjoint()?;
        Ok(this)
    }

    fn check_disjoint(&self) -> Result<()> {
        for other in [&self.config_root, &self.var_root] {
            if other.starts_with(&self.prefix) {
                return Err(ResourceError::PrefixOverlap {
                    inner: other.clone(),
                    outer: self.prefix.clone(),
                });
            }
            if self.prefix.starts_with(other) {
                return Err(ResourceError::PrefixOverlap {
                    inner: self.prefix.clone(),
                    outer: other.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn libexec(&self) -> PathBuf {
        self.prefix.join("libexec")
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Symlink inside the prefix that points at [`Self::config_root`].
    pub fn config_link(&self) -> PathBuf {
        self.prefix.join("config")
    }

    pub fn var_root(&self) -> &Path {
        &self.var_root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.var_root.join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.var_root.join("log")
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.var_root.join("plugins")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.prefix.join("INSTALL_MANIFEST.json")
    }

    pub fn staging_root(&self) -> PathBuf {
        self.root.join(".keg").join("staging")
    }

    /// Lock shared by every version of the package, since they share config and var roots.
    pub fn lock_path(&self) -> PathBuf {
        Self::lock_file(&self.root, &self.package)
    }

    /// Lock file serializing every operation on `package` under `root`.
    pub fn lock_file(root: &Path, package: &str) -> PathBuf {
        root.join(".keg").join("locks").join(format!("{package}.lock"))
    }

    /// Directory holding one prefix per installed version of `package`.
    pub fn package_dir(root: &Path, package: &str) -> PathBuf {
        root.join("cellar").join(package)
    }

    pub fn anchor_dir(&self, anchor: Anchor) -> &Path {
        match anchor {
            Anchor::Prefix => &self.prefix,
            Anchor::Config => &self.config_root,
        }
    }

    /// Join a relative path under an anchor, refusing anything that would escape it.
    pub fn resolve(&self, anchor: Anchor, relative: &Path) -> Result<PathBuf> {
        check_relative(relative)?;
        Ok(self.anchor_dir(anchor).join(relative))
    }
}

/// `relative` must be non-empty and made only of normal components.
pub fn check_relative(relative: &Path) -> Result<()> {
    let ok = relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(ResourceError::EscapingPath(relative.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keg_verify::Checksum;

    fn spec() -> PackageSpec {
        PackageSpec::archive("demo", "1.0", "file:///demo.tar.gz", Checksum::of(b"x"))
    }

    #[test]
    fn standard_layout() {
        let p = InstallationPrefix::new("/opt/keg", &spec()).unwrap();
        assert_eq!(p.prefix(), Path::new("/opt/keg/cellar/demo/1.0"));
        assert_eq!(p.config_root(), Path::new("/opt/keg/etc/demo"));
        assert_eq!(p.config_link(), Path::new("/opt/keg/cellar/demo/1.0/config"));
        assert_eq!(p.data_dir(), Path::new("/opt/keg/var/demo/data"));
        assert_eq!(p.log_dir(), Path::new("/opt/keg/var/demo/log"));
        assert_eq!(p.plugins_dir(), Path::new("/opt/keg/var/demo/plugins"));
        assert_eq!(p.lock_path(), Path::new("/opt/keg/.keg/locks/demo.lock"));
    }

    #[test]
    fn runtime_paths_must_not_live_in_prefix() {
        let result = InstallationPrefix::with_paths(
            "/opt/keg",
            "demo",
            "/opt/keg/cellar/demo/1.0",
            "/opt/keg/etc/demo",
            "/opt/keg/cellar/demo/1.0/var",
        );
        assert!(matches!(result, Err(ResourceError::PrefixOverlap { .. })));
    }

    #[test]
    fn resolve_rejects_escapes() {
        let p = InstallationPrefix::new("/opt/keg", &spec()).unwrap();
        assert_eq!(
            p.resolve(Anchor::Config, Path::new("app.yml")).unwrap(),
            Path::new("/opt/keg/etc/demo/app.yml")
        );
        assert!(p.resolve(Anchor::Prefix, Path::new("../etc/passwd")).is_err());
        assert!(p.resolve(Anchor::Prefix, Path::new("/etc/passwd")).is_err());
        assert!(p.resolve(Anchor::Prefix, Path::new("")).is_err());
    }
}
