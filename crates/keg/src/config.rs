use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::GlobalArgs;

pub const CONFIG_FILE: &str = "keg.toml";

/// Contents of `keg.toml`. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KegConfig {
    pub root: Option<PathBuf>,
    pub env: Option<String>,
    pub strict_layout: bool,
    /// Seconds.
    pub fetch_timeout: Option<u64>,
    /// Seconds.
    pub build_timeout: Option<u64>,
    /// Seconds.
    pub extract_timeout: Option<u64>,
    pub vars: BTreeMap<String, String>,
}

impl KegConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid keg configuration")
    }

    /// Read `explicit` if given, otherwise `~/.keg/keg.toml` when it exists.
    pub fn load(explicit: Option<&Path>, home: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match home.map(|h| h.join(".keg").join(CONFIG_FILE)) {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

/// Effective settings after flags, environment and file are merged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub env: String,
    pub strict_layout: bool,
    pub fetch_timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub extract_timeout: Option<Duration>,
    pub vars: BTreeMap<String, String>,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, file: KegConfig, home: Option<&Path>) -> Result<Self> {
        let root = match args.root.clone().or(file.root) {
            Some(root) => root,
            None => home
                .map(|h| h.join(".keg"))
                .context("no installation root given and home directory is unknown")?,
        };
        Ok(Self {
            root,
            env: args
                .env
                .clone()
                .or(file.env)
                .unwrap_or_else(|| keg_install::DEFAULT_ENV.to_owned()),
            strict_layout: file.strict_layout,
            fetch_timeout: file.fetch_timeout.map(Duration::from_secs),
            build_timeout: file.build_timeout.map(Duration::from_secs),
            extract_timeout: file.extract_timeout.map(Duration::from_secs),
            vars: file.vars,
        })
    }
}
