//! The declarative recipe: one TOML document per package.
//!
//! ```toml
//! caveats = "Config: {config_root}"
//!
//! [package]
//! name = "demo"
//! version = "1.0"
//! source = { kind = "archive", url = "https://example.com/demo-1.0.tar.gz", checksum = "sha256:..." }
//!
//! [[layout]]
//! pattern = "bin/*.bat"
//! class = { excluded = "windows" }
//!
//! [[rewrite]]
//! root = "config"
//! file = "app.yml"
//! pattern = '#\s*host: [^\n]+'
//! regex = true
//! replace = "host: 127.0.0.1"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Anchor, PackageSpec, ResourceError, Result};

/// What a staged file is, which decides where it goes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    Executable,
    Library,
    PluginLibrary,
    Documentation,
    Configuration,
    /// Anything else that belongs in the prefix.
    Payload,
    /// Dropped because it only applies to the named platform.
    Excluded(String),
}

impl FileClass {
    /// Tree the class installs into; `None` for excluded files.
    pub fn anchor(&self) -> Option<Anchor> {
        match self {
            Self::Configuration => Some(Anchor::Config),
            Self::Excluded(_) => None,
            _ => Some(Anchor::Prefix),
        }
    }
}

/// One classification rule. The first rule whose pattern matches a file wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRuleSpec {
    /// Glob relative to the staging root, e.g. `lib/sigar/*.{jar,dylib}`.
    pub pattern: String,
    pub class: FileClass,
    /// Directory under the class's anchor that receives matches.
    #[serde(default)]
    pub into: String,
    /// Leading components removed from the source path before joining `into`.
    #[serde(default)]
    pub strip: usize,
    /// Keep only the file name.
    #[serde(default)]
    pub flatten: bool,
}

impl LayoutRuleSpec {
    pub fn new(pattern: impl Into<String>, class: FileClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
            into: String::new(),
            strip: 0,
            flatten: false,
        }
    }

    pub fn into_dir(mut self, dir: impl Into<String>) -> Self {
        self.into = dir.into();
        self
    }

    pub fn strip(mut self, n: usize) -> Self {
        self.strip = n;
        self
    }

    pub fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }
}

/// One text substitution applied to an installed file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRuleSpec {
    #[serde(default = "default_anchor")]
    pub root: Anchor,
    /// Path of the target file relative to `root`.
    pub file: String,
    pub pattern: String,
    /// Treat `pattern` as a regular expression instead of a literal.
    #[serde(default)]
    pub regex: bool,
    /// Replacement template, rendered with the install context.
    pub replace: String,
    /// Replace every match rather than the first.
    #[serde(default)]
    pub all: bool,
    #[serde(default = "default_true")]
    pub mandatory: bool,
}

fn default_anchor() -> Anchor {
    Anchor::Prefix
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInstallSpec {
    /// Directory templates that must exist after install.
    #[serde(default = "default_dirs")]
    pub dirs: Vec<String>,
    /// Link `<prefix>/config` to the configuration root.
    #[serde(default = "default_true")]
    pub link_config: bool,
}

fn default_dirs() -> Vec<String> {
    vec![
        "{data_dir}".to_owned(),
        "{log_dir}".to_owned(),
        "{plugins_dir}".to_owned(),
    ]
}

impl Default for PostInstallSpec {
    fn default() -> Self {
        Self {
            dirs: default_dirs(),
            link_config: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    #[default]
    Always,
    OnFailure,
    Never,
}

/// Templates from which a service descriptor is derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default = "default_true")]
    pub run_at_load: bool,
    /// Log file templates; absent means output is discarded.
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

fn default_working_dir() -> String {
    "{var_root}".to_owned()
}

impl ServiceTemplate {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: default_working_dir(),
            restart: RestartPolicy::default(),
            run_at_load: true,
            stdout: None,
            stderr: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub package: PackageSpec,
    #[serde(default)]
    pub layout: Vec<LayoutRuleSpec>,
    #[serde(default)]
    pub rewrite: Vec<RewriteRuleSpec>,
    #[serde(default)]
    pub post_install: PostInstallSpec,
    #[serde(default)]
    pub service: Option<ServiceTemplate>,
    #[serde(default)]
    pub caveats: Option<String>,
}

impl Formula {
    pub fn new(package: PackageSpec) -> Self {
        Self {
            package,
            layout: Vec::new(),
            rewrite: Vec::new(),
            post_install: PostInstallSpec::default(),
            service: None,
            caveats: None,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let formula: Self = toml::from_str(s)?;
        formula.package.validate()?;
        Ok(formula)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ResourceError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&text)
    }
}
