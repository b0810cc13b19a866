use anyhow::{Context, Result};
use keg_fetch::{FetchOptions, Fetcher, ReqwestClient};
use keg_install::{InstallStatus, InstallationManager};
use keg_resource::Formula;
use keg_service::ServiceDescriptorBuilder;

use crate::cli::{InstallArg, ServiceArg, ServiceFormat, StatusArg, UninstallArg};
use crate::config::Settings;

fn manager(settings: &Settings) -> Result<InstallationManager<ReqwestClient>> {
    let client = ReqwestClient::new().context("failed to build HTTP client")?;
    let mut options = FetchOptions::default();
    if let Some(timeout) = settings.fetch_timeout {
        options = options.download_timeout(timeout);
    }
    if let Some(timeout) = settings.build_timeout {
        options = options.build_timeout(timeout);
    }
    let fetcher = Fetcher::new(client)
        .context("failed to start fetch runtime")?
        .with_options(options);

    let mut manager = InstallationManager::new(&settings.root, fetcher)
        .env(&settings.env)
        .vars(settings.vars.clone())
        .strict_layout(settings.strict_layout);
    if let Some(limit) = settings.extract_timeout {
        manager = manager.extract_timeout(limit);
    }
    Ok(manager)
}

fn load_formula(path: &std::path::Path) -> Result<Formula> {
    Formula::from_path(path).with_context(|| format!("failed to load formula {}", path.display()))
}

pub fn install(settings: &Settings, arg: InstallArg) -> Result<()> {
    let formula = load_formula(&arg.formula)?;
    let manager = manager(settings)?
        .vars(arg.vars)
        .strict_layout(settings.strict_layout || arg.strict);

    let report = manager.install(&formula).with_context(|| {
        format!(
            "failed to install {} {}",
            formula.package.name, formula.package.version
        )
    })?;

    println!(
        "installed {} {} into {}",
        report.manifest.name,
        report.manifest.version,
        report.prefix.prefix().display()
    );
    println!(
        "  {} files, {} dropped, {} files rewritten",
        report.manifest.files.len(),
        report.manifest.dropped.len(),
        report.rewrites.changed.len()
    );
    for failure in &report.hook_failures {
        eprintln!("warning: hook `{}` failed: {}", failure.name, failure.error);
    }
    for path in &report.preserved_config {
        println!("  kept modified config, new default at {}", path.display());
    }
    if let Some(caveats) = &report.caveats {
        println!();
        println!("{}", caveats.trim_end());
    }
    Ok(())
}

pub fn uninstall(settings: &Settings, arg: UninstallArg) -> Result<()> {
    let report = manager(settings)?
        .uninstall(&arg.name, arg.version.as_deref(), arg.purge)
        .with_context(|| format!("failed to uninstall {}", arg.name))?;
    for path in report.removed {
        println!("removed {}", path.display());
    }
    for path in report.purged {
        println!("purged {}", path.display());
    }
    Ok(())
}

pub fn status(settings: &Settings, arg: StatusArg) -> Result<()> {
    match manager(settings)?.status(&arg.name)? {
        InstallStatus::NotInstalled => println!("{}: not installed", arg.name),
        InstallStatus::Installed(versions) => {
            for v in versions {
                println!(
                    "{} {}\t{}\t{} files",
                    arg.name,
                    v.version,
                    v.prefix.display(),
                    v.files
                );
            }
        }
    }
    Ok(())
}

pub fn service(settings: &Settings, arg: ServiceArg) -> Result<()> {
    let formula = load_formula(&arg.formula)?;
    let template = formula
        .service
        .as_ref()
        .with_context(|| format!("{} declares no service", formula.package.name))?;
    let prefix = manager(settings)?.prefix_for(&formula.package)?;

    let descriptor = ServiceDescriptorBuilder::new(template)
        .vars(settings.vars.clone())
        .vars(arg.vars)
        .build(&prefix, &formula.package, &settings.env)?;

    let rendered = match arg.format {
        ServiceFormat::Json => descriptor.to_json()?,
        ServiceFormat::Systemd => descriptor.to_systemd_unit(),
        ServiceFormat::Launchd => descriptor.to_launchd_plist(),
    };
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}
