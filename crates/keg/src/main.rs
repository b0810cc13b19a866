use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{App, Commands};
use crate::config::{KegConfig, Settings};

mod cli;
mod commands;
mod config;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KEG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let app = App::parse();
    init_tracing();

    let home = home::home_dir();
    let file = KegConfig::load(app.global.config.as_deref(), home.as_deref())?;
    let settings = Settings::resolve(&app.global, file, home.as_deref())?;
    tracing::debug!(root = %settings.root.display(), env = %settings.env, "settings resolved");

    match app.cmd {
        Commands::Install(arg) => commands::install(&settings, arg),
        Commands::Uninstall(arg) => commands::uninstall(&settings, arg),
        Commands::Status(arg) => commands::status(&settings, arg),
        Commands::Service(arg) => commands::service(&settings, arg),
    }
}
