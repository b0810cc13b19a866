//! Lifecycle callbacks around an installation.

use keg_resource::{Context, InstallationPrefix, PackageSpec};

use crate::error::{HookError, InstallError};
use crate::manifest::Manifest;

/// What a hook can see once the prefix is in place.
#[derive(Clone, Copy, Debug)]
pub struct HookContext<'a> {
    pub spec: &'a PackageSpec,
    pub prefix: &'a InstallationPrefix,
    pub manifest: &'a Manifest,
    pub vars: &'a Context,
}

pub trait InstallHook: Send + Sync {
    /// Name used in error reports.
    fn name(&self) -> &'static str;

    /// Runs once the prefix has been promoted, so the installation is
    /// already committed. An error is logged and listed in
    /// [`InstallReport::hook_failures`](crate::InstallReport::hook_failures);
    /// it does not roll anything back.
    fn post_install(&self, _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after an installation that never reached promotion has been
    /// cleaned up.
    fn on_failure(&self, _spec: &PackageSpec, _error: &InstallError) {}
}
