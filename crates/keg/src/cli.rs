use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(name = "keg", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Args)]
pub struct GlobalArgs {
    /// Installation root (cellar, etc and var live below it).
    #[arg(long, global = true, env = "KEG_ROOT")]
    pub root: Option<PathBuf>,
    /// Runtime environment name, used in service labels and templates.
    #[arg(long, global = true, env = "KEG_ENV")]
    pub env: Option<String>,
    /// Configuration file, defaults to `~/.keg/keg.toml` when present.
    #[arg(long, global = true, env = "KEG_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "i", name = "install", about = "Install a package from a formula file")]
    Install(InstallArg),
    #[command(alias = "rm", name = "uninstall", about = "Remove installed versions of a package")]
    Uninstall(UninstallArg),
    #[command(alias = "st", name = "status", about = "Show installed versions of a package")]
    Status(StatusArg),
    #[command(alias = "svc", name = "service", about = "Render the service descriptor of a formula")]
    Service(ServiceArg),
}

#[derive(Clone, Debug, Args)]
pub struct InstallArg {
    /// Formula file (TOML).
    pub formula: PathBuf,
    /// Extra template variable, `key=value`. Repeatable.
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
    /// Fail on files no layout rule classifies instead of dropping them.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Clone, Debug, Args)]
pub struct UninstallArg {
    pub name: String,
    /// Only remove this version.
    #[arg(long)]
    pub version: Option<String>,
    /// Also delete configuration and variable data once no version remains.
    #[arg(long)]
    pub purge: bool,
}

#[derive(Clone, Debug, Args)]
pub struct StatusArg {
    pub name: String,
}

#[derive(Clone, Debug, Args)]
pub struct ServiceArg {
    /// Formula file (TOML).
    pub formula: PathBuf,
    #[arg(long, value_enum, default_value_t = ServiceFormat::Json)]
    pub format: ServiceFormat,
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServiceFormat {
    Json,
    Systemd,
    Launchd,
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in `{s}`"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        App::command().debug_assert();
    }

    #[test]
    fn install_collects_vars() {
        let app = App::try_parse_from([
            "keg",
            "install",
            "search.toml",
            "--var",
            "cluster_name=search_ops",
            "--var",
            "heap=1g=2g",
            "--strict",
        ])
        .unwrap();
        let Commands::Install(arg) = app.cmd else {
            panic!("expected install");
        };
        assert!(arg.strict);
        assert_eq!(
            arg.vars,
            vec![
                ("cluster_name".to_owned(), "search_ops".to_owned()),
                ("heap".to_owned(), "1g=2g".to_owned()),
            ]
        );
    }

    #[test]
    fn malformed_var_is_rejected() {
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn service_format_defaults_to_json() {
        let app = App::try_parse_from(["keg", "service", "f.toml", "--format", "systemd"]).unwrap();
        let Commands::Service(arg) = app.cmd else {
            panic!("expected service");
        };
        assert_eq!(arg.format, ServiceFormat::Systemd);

        let app = App::try_parse_from(["keg", "svc", "f.toml"]).unwrap();
        let Commands::Service(arg) = app.cmd else {
            panic!("expected service");
        };
        assert_eq!(arg.format, ServiceFormat::Json);
    }
}
