//! Orchestrates fetch → extract → plan → rewrite → finalize for one formula.
//!
//! ```no_run
//! use keg_fetch::{Fetcher, ReqwestClient};
//! use keg_install::InstallationManager;
//! use keg_resource::Formula;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let formula = Formula::from_path("demos/elasticsearch.toml")?;
//! let manager = InstallationManager::new("/opt/keg", Fetcher::new(ReqwestClient::new()?)?)
//!     .var("cluster_name", "elasticsearch_alice");
//! let report = manager.install(&formula)?;
//! println!("installed {} files", report.manifest.files.len());
//! # Ok(())
//! # }
//! ```
//!
//! The prefix is only ever replaced as a whole, after every stage succeeded.
//! Configuration goes to a separate root that survives upgrades, and runtime
//! directories live under the variable-data root.

mod error;
mod hooks;
mod manager;
mod manifest;
mod stage;
mod state;

pub use error::{HookError, InstallError, Result, Stage};
pub use hooks::{HookContext, InstallHook};
pub use manager::{
    CONFIG_LINK, DEFAULT_ENV, HookFailure, InstallReport, InstallStatus, InstallationManager,
    InstalledVersion, UninstallReport,
};
pub use manifest::{DroppedEntry, MANIFEST_FILE, Manifest, ManifestEntry};
pub use state::InstallState;
