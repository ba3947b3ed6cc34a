mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use strata_config::ConfigLoader;

use crate::cli::Cli;
use crate::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_overrides(&mut config);
    init_logging(&config.log);

    commands::run(&cli, &config)
}
