use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keg_archive::ExtractOptions;
use keg_fetch::{Artifact, CancellationToken, Fetcher, HttpClient};
use keg_fs::{PrefixLock, Workspace};
use keg_layout::{LayoutPlan, LayoutPlanner};
use keg_resource::{Anchor, Context, Formula, InstallationPrefix, PackageSpec, PostInstallSpec};
use keg_rewrite::{RewriteReport, TemplateRewriter};
use keg_service::{ServiceDescriptor, ServiceDescriptorBuilder};

use crate::error::{HookError, InstallError, Result, Stage};
use crate::hooks::{HookContext, InstallHook};
use crate::manifest::{MANIFEST_FILE, Manifest, ManifestEntry};
use crate::stage::StagedRoots;
use crate::state::{InstallState, StateMachine};

/// Name of the link inside the prefix that points at the config root.
pub const CONFIG_LINK: &str = "config";

pub const DEFAULT_ENV: &str = "production";

/// Outcome of a successful [`InstallationManager::install`].
#[derive(Debug)]
pub struct InstallReport {
    pub prefix: InstallationPrefix,
    pub manifest: Manifest,
    /// Every state the installation passed through, ending in `Done`.
    pub history: Vec<InstallState>,
    pub rewrites: RewriteReport,
    /// `.default` files written next to user-modified configuration.
    pub preserved_config: Vec<PathBuf>,
    pub service: Option<ServiceDescriptor>,
    pub caveats: Option<String>,
    /// Hooks that returned an error. The installation itself stands.
    pub hook_failures: Vec<HookFailure>,
}

/// A post-install hook that failed after the prefix was promoted.
#[derive(Debug)]
pub struct HookFailure {
    pub name: &'static str,
    pub error: HookError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledVersion {
    pub version: String,
    pub prefix: PathBuf,
    pub files: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallStatus {
    NotInstalled,
    /// One entry per installed version, ordered by version directory name.
    Installed(Vec<InstalledVersion>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed: Vec<PathBuf>,
    pub purged: Vec<PathBuf>,
}

/// Runs the install pipeline for formulas under one keg root.
///
/// Fetch, extract, plan and rewrite all happen inside a staging workspace.
/// The prefix is replaced in a single rename at the end, so a failure or
/// cancellation at any earlier point leaves it exactly as it was.
pub struct InstallationManager<C: HttpClient> {
    root: PathBuf,
    fetcher: Fetcher<C>,
    env: String,
    vars: BTreeMap<String, String>,
    strict_layout: bool,
    extract_timeout: Option<Duration>,
    hooks: Vec<Box<dyn InstallHook>>,
}

impl<C: HttpClient> InstallationManager<C> {
    pub fn new(root: impl Into<PathBuf>, fetcher: Fetcher<C>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            env: DEFAULT_ENV.to_owned(),
            vars: BTreeMap::new(),
            strict_layout: false,
            extract_timeout: None,
            hooks: Vec::new(),
        }
    }

    /// Runtime environment name, exposed to templates as `{env}`.
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Extra template variable. Built-in names cannot be overridden.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn strict_layout(mut self, strict: bool) -> Self {
        self.strict_layout = strict;
        self
    }

    /// Abort extraction that runs longer than `limit`.
    pub fn extract_timeout(mut self, limit: Duration) -> Self {
        self.extract_timeout = Some(limit);
        self
    }

    pub fn hook<H: InstallHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Token that aborts the running installation when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.fetcher.cancellation_token()
    }

    pub fn prefix_for(&self, spec: &PackageSpec) -> Result<InstallationPrefix> {
        Ok(InstallationPrefix::new(&self.root, spec)?)
    }

    /// Template context for `spec`, including configured variables.
    pub fn context(&self, spec: &PackageSpec, prefix: &InstallationPrefix) -> Context {
        Context::for_install(spec, prefix, &self.env).extend(self.vars.clone())
    }

    pub fn install(&self, formula: &Formula) -> Result<InstallReport> {
        let spec = &formula.package;
        let mut machine = StateMachine::new(&spec.name);

        match self.run(formula, &mut machine) {
            Ok(mut report) => {
                machine.finish();
                report.history = machine.into_history();
                tracing::info!(package = %spec.name, version = %spec.version, prefix = %report.prefix.prefix().display(), "installed");
                Ok(report)
            }
            Err(error) => {
                machine.fail(&error);
                for hook in &self.hooks {
                    hook.on_failure(spec, &error);
                }
                Err(error)
            }
        }
    }

    fn enter(&self, machine: &mut StateMachine, stage: Stage) -> Result<()> {
        if self.fetcher.options().cancel.is_cancelled() {
            return Err(InstallError::Cancelled(stage));
        }
        machine.enter(stage);
        Ok(())
    }

    fn run(&self, formula: &Formula, machine: &mut StateMachine) -> Result<InstallReport> {
        let spec = &formula.package;
        spec.validate()?;
        let prefix = self.prefix_for(spec)?;
        let ctx = self.context(spec, &prefix);

        let _lock = PrefixLock::acquire(prefix.lock_path()).map_err(InstallError::fs(Stage::Pending))?;
        let workspace =
            Workspace::new(prefix.staging_root()).map_err(InstallError::fs(Stage::Pending))?;

        self.enter(machine, Stage::Fetching)?;
        let scratch = workspace
            .subdir("fetch")
            .map_err(InstallError::fs(Stage::Fetching))?;
        let artifact = self.fetcher.fetch(spec, &scratch)?;

        self.enter(machine, Stage::Extracting)?;
        let tree = match artifact {
            Artifact::Archive {
                bytes,
                strip_components,
            } => {
                let tree = workspace
                    .subdir("tree")
                    .map_err(InstallError::fs(Stage::Extracting))?;
                let mut options = ExtractOptions::default()
                    .strip_components(strip_components)
                    .cancel_with(self.fetcher.cancellation_token());
                if let Some(limit) = self.extract_timeout {
                    options = options.timeout(limit);
                }
                let report = keg_archive::extract_bytes(&bytes, &tree, &options)?;
                tracing::debug!(
                    entries = report.entries.len(),
                    bytes = report.total_bytes,
                    "extracted"
                );
                tree
            }
            Artifact::Tree { path } => path,
        };

        self.enter(machine, Stage::Planning)?;
        let mut planner = LayoutPlanner::new(&formula.layout)?
            .strict(self.strict_layout)
            .reserve(Anchor::Prefix, MANIFEST_FILE);
        if formula.post_install.link_config {
            planner = planner.reserve(Anchor::Prefix, CONFIG_LINK);
        }
        let plan = planner.plan(&tree)?;
        if plan.is_empty() {
            tracing::warn!(package = %spec.name, "layout plan installs no files");
        }
        let staged = StagedRoots::create(&workspace)?;
        staged.populate(&plan, &tree)?;

        self.enter(machine, Stage::Rewriting)?;
        let rewrites = TemplateRewriter::new(&formula.rewrite)?.apply(|a| staged.root(a), &ctx)?;

        self.enter(machine, Stage::Finalizing)?;
        let service = formula
            .service
            .as_ref()
            .map(|t| {
                ServiceDescriptorBuilder::new(t)
                    .vars(self.vars.clone())
                    .build(&prefix, spec, &self.env)
            })
            .transpose()?;
        let caveats = formula
            .caveats
            .as_deref()
            .map(|c| ctx.expand(c))
            .transpose()
            .map_err(|source| InstallError::Template {
                what: "caveats",
                source,
            })?;
        let directories = runtime_dirs(&formula.post_install, &prefix, &ctx)?;

        // Config and runtime directories live outside the prefix. They are
        // written now and undone by `live` unless the promotion succeeds.
        let mut live = staged.install_config(&plan, &prefix)?;
        for dir in &directories {
            live.create_dir(dir)?;
        }
        let manifest = build_manifest(spec, &prefix, &ctx, &plan, &live.config, directories, formula.post_install.link_config);

        if manifest.config_link.is_some() {
            keg_fs::ensure_symlink(prefix.config_root(), staged.prefix.join(CONFIG_LINK))
                .map_err(InstallError::fs(Stage::Finalizing))?;
        }
        keg_fs::atomic_write(
            staged.prefix.join(MANIFEST_FILE),
            &manifest.to_json()?,
            keg_fs::AtomicWriteOptions::new().sync(true),
        )
        .map_err(InstallError::fs(Stage::Finalizing))?;

        if self.fetcher.options().cancel.is_cancelled() {
            return Err(InstallError::Cancelled(Stage::Finalizing));
        }
        workspace
            .promote(StagedRoots::PREFIX, prefix.prefix())
            .map_err(InstallError::fs(Stage::Finalizing))?;
        let preserved_config = live.commit();
        tracing::info!(prefix = %prefix.prefix().display(), "prefix promoted");

        // Past this point the install is committed; hooks cannot undo it.
        let hook_ctx = HookContext {
            spec,
            prefix: &prefix,
            manifest: &manifest,
            vars: &ctx,
        };
        let mut hook_failures = Vec::new();
        for hook in &self.hooks {
            if let Err(error) = hook.post_install(&hook_ctx) {
                tracing::warn!(hook = hook.name(), error = %error, "post-install hook failed");
                hook_failures.push(HookFailure {
                    name: hook.name(),
                    error,
                });
            }
        }

        if let Err(e) = workspace.close() {
            tracing::warn!(error = %e, "failed to remove staging workspace");
        }

        Ok(InstallReport {
            prefix,
            manifest,
            history: Vec::new(),
            rewrites,
            preserved_config,
            service,
            caveats,
            hook_failures,
        })
    }

    /// Manifests of every installed version of `name`.
    pub fn installed(&self, name: &str) -> Result<Vec<Manifest>> {
        let dir = InstallationPrefix::package_dir(&self.root, name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(InstallError::io(Stage::Pending, &dir)(e)),
        };

        let mut prefixes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(InstallError::io(Stage::Pending, &dir))?;
            // leftovers of an interrupted prefix swap are dot-prefixed
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && entry.path().is_dir() {
                prefixes.push(entry.path());
            }
        }
        prefixes.sort();

        let mut manifests = Vec::new();
        for prefix in prefixes {
            let path = prefix.join(MANIFEST_FILE);
            if !path.is_file() {
                tracing::warn!(prefix = %prefix.display(), "prefix has no manifest, ignoring");
                continue;
            }
            let manifest = Manifest::load(&path)?;
            if manifest.name != name {
                return Err(InstallError::ManifestMismatch {
                    path,
                    expected: name.to_owned(),
                    found: manifest.name,
                });
            }
            manifests.push(manifest);
        }
        Ok(manifests)
    }

    pub fn status(&self, name: &str) -> Result<InstallStatus> {
        let versions: Vec<InstalledVersion> = self
            .installed(name)?
            .into_iter()
            .map(|m| InstalledVersion {
                files: m.files.len(),
                version: m.version,
                prefix: m.prefix,
            })
            .collect();
        if versions.is_empty() {
            Ok(InstallStatus::NotInstalled)
        } else {
            Ok(InstallStatus::Installed(versions))
        }
    }

    /// Remove installed prefixes of `name` (one version, or all). The config
    /// and variable-data roots are kept unless `purge` is set and no version
    /// remains installed.
    pub fn uninstall(&self, name: &str, version: Option<&str>, purge: bool) -> Result<UninstallReport> {
        let _lock = PrefixLock::acquire(InstallationPrefix::lock_file(&self.root, name))
            .map_err(InstallError::fs(Stage::Pending))?;

        let installed = self.installed(name)?;
        let total = installed.len();
        let targets: Vec<Manifest> = installed
            .into_iter()
            .filter(|m| version.is_none_or(|v| m.version == v))
            .collect();
        if targets.is_empty() {
            return Err(InstallError::NotInstalled(match version {
                Some(v) => format!("{name} {v}"),
                None => name.to_owned(),
            }));
        }

        let mut report = UninstallReport::default();
        let remaining = total - targets.len();
        for manifest in &targets {
            if let Some(stray) = manifest
                .files
                .iter()
                .find(|f| f.anchor == Anchor::Prefix && !f.installed.starts_with(&manifest.prefix))
            {
                return Err(InstallError::ManifestMismatch {
                    path: manifest.prefix.join(MANIFEST_FILE),
                    expected: manifest.prefix.display().to_string(),
                    found: stray.installed.display().to_string(),
                });
            }
            keg_fs::remove_dir_if_exists(&manifest.prefix).map_err(InstallError::fs(Stage::Finalizing))?;
            tracing::info!(package = name, version = %manifest.version, "removed prefix");
            report.removed.push(manifest.prefix.clone());
        }

        let package_dir = InstallationPrefix::package_dir(&self.root, name);
        if remaining == 0 {
            // non-empty means swap leftovers or foreign files; leave them be
            match std::fs::remove_dir(&package_dir) {
                Ok(()) => tracing::debug!(dir = %package_dir.display(), "removed package directory"),
                Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => {}
                Err(e) => tracing::debug!(
                    dir = %package_dir.display(),
                    error = %e,
                    "package directory not removed"
                ),
            }
        }

        if purge && remaining == 0 {
            if let Some(manifest) = targets.first() {
                for dir in [&manifest.config_root, &manifest.var_root] {
                    if keg_fs::remove_dir_if_exists(dir).map_err(InstallError::fs(Stage::Finalizing))? {
                        tracing::info!(dir = %dir.display(), "purged");
                        report.purged.push(dir.clone());
                    }
                }
            }
        }
        Ok(report)
    }
}

fn runtime_dirs(spec: &PostInstallSpec, prefix: &InstallationPrefix, ctx: &Context) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::with_capacity(spec.dirs.len());
    for template in &spec.dirs {
        let rendered = ctx.expand(template).map_err(|source| InstallError::Template {
            what: "post-install directory",
            source,
        })?;
        let path = Path::new(&rendered);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            prefix.var_root().join(path)
        };
        if path.starts_with(prefix.prefix()) {
            return Err(InstallError::RuntimeDirInPrefix {
                path,
                prefix: prefix.prefix().to_path_buf(),
            });
        }
        dirs.push(path);
    }
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

fn build_manifest(
    spec: &PackageSpec,
    prefix: &InstallationPrefix,
    ctx: &Context,
    plan: &LayoutPlan,
    config_installed: &BTreeMap<PathBuf, PathBuf>,
    directories: Vec<PathBuf>,
    link_config: bool,
) -> Manifest {
    let mut manifest = Manifest::new(spec, prefix, ctx.get("install_id").unwrap_or_default());
    manifest.record_dropped(plan);
    manifest.files = plan
        .files
        .iter()
        .map(|file| ManifestEntry {
            source: file.source.clone(),
            installed: config_installed
                .get(&file.source)
                .cloned()
                .unwrap_or_else(|| file.destination(prefix)),
            anchor: file.anchor,
            class: file.class.clone(),
        })
        .collect();
    manifest.directories = directories;
    manifest.config_link = link_config.then(|| prefix.config_link());
    manifest
}
