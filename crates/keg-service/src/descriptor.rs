use std::collections::BTreeMap;
use std::path::PathBuf;

use keg_resource::RestartPolicy;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything a process supervisor needs to run an installed package.
///
/// Derived from a [`ServiceTemplate`](keg_resource::ServiceTemplate); never
/// edited by hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub label: String,
    pub name: String,
    pub version: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: PathBuf,
    pub restart: RestartPolicy,
    pub run_at_load: bool,
    /// `None` discards the stream.
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl ServiceDescriptor {
    /// Program followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
