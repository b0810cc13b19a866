use keg_verify::Checksum;
use serde::{Deserialize, Serialize};

use crate::{ResourceError, Result};

/// A resolved package: what to fetch, how to trust it and what it needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
    pub source: Source,
    #[serde(default, rename = "dependency", skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

/// Where the payload comes from. Chosen once when the package is resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// A prebuilt release archive (`http(s)://` or `file://`).
    Archive {
        url: String,
        checksum: Checksum,
        #[serde(default = "default_strip")]
        strip_components: usize,
    },
    /// A version-control checkout built by an external tool.
    Vcs {
        repository: String,
        #[serde(rename = "ref")]
        reference: String,
        build: BuildRecipe,
    },
}

fn default_strip() -> usize {
    1
}

/// External build invocation for [`Source::Vcs`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecipe {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Glob, relative to the checkout, naming the archive the build produces.
    /// Without one the checkout itself is the payload.
    #[serde(default)]
    pub artifact: Option<String>,
    #[serde(default = "default_strip")]
    pub strip_components: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Build,
    Runtime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
}

impl Dependency {
    pub fn build(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: Stage::Build,
            requirement: None,
        }
    }

    pub fn runtime(name: impl Into<String>, requirement: Option<&str>) -> Self {
        Self {
            name: name.into(),
            stage: Stage::Runtime,
            requirement: requirement.map(str::to_owned),
        }
    }
}

impl PackageSpec {
    pub fn archive(
        name: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
        checksum: Checksum,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source: Source::Archive {
                url: url.into(),
                checksum,
                strip_components: default_strip(),
            },
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn build_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.stage == Stage::Build)
    }

    pub fn runtime_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.stage == Stage::Runtime)
    }

    /// Leading path components the extractor removes from every entry.
    pub fn strip_components(&self) -> usize {
        match &self.source {
            Source::Archive {
                strip_components, ..
            } => *strip_components,
            Source::Vcs { build, .. } => build.strip_components,
        }
    }

    /// Name and version must be usable as single path components.
    pub fn validate(&self) -> Result<()> {
        if !is_component(&self.name) {
            return Err(ResourceError::InvalidName(self.name.clone()));
        }
        if !is_component(&self.version) {
            return Err(ResourceError::InvalidVersion(self.version.clone()));
        }
        Ok(())
    }
}

fn is_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains(['/', '\\', '\0'])
        && !s.chars().any(char::is_whitespace)
}
