use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use strata_config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Inspect and run schema migrations for the application database",
    after_help = "Examples:\n  \
    strata status\n  \
    strata ensure\n  \
    strata up --target 20240412143000_add_transcript_model_id\n  \
    strata down --target 20240301090500_create_transcripts --dry-run"
)]
pub struct Cli {
    /// Config file (YAML or TOML). Defaults to ~/.strata/config.{yml,yaml,toml}
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true, env = "STRATA_DATABASE")]
    pub database: Option<PathBuf>,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level, overriding the config (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Show which migrations are applied and any drift in the applied state
    Status,
    /// Apply pending migrations
    Up(UpArgs),
    /// Revert applied migrations
    Down(DownArgs),
    /// Apply every pending migration (what the application runs at startup)
    Ensure,
}

#[derive(Args, Debug, PartialEq)]
pub struct UpArgs {
    /// Stop after applying this migration id
    #[arg(long)]
    pub target: Option<String>,

    /// List what would run without touching the database schema
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, PartialEq)]
#[command(group(
    ArgGroup::new("scope")
        .args(["target", "all"])
        .required(true)
        .multiple(false)
))]
pub struct DownArgs {
    /// Revert every migration newer than this id
    #[arg(long)]
    pub target: Option<String>,

    /// Revert every applied migration
    #[arg(long)]
    pub all: bool,

    /// List what would run without touching the database schema
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.database {
            config.database.path = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_up_with_target() {
        let cli =
            Cli::try_parse_from(["strata", "up", "--target", "20240101_a", "--json"]).unwrap();
        assert!(cli.json);
        assert_eq!(
            cli.command,
            Commands::Up(UpArgs {
                target: Some("20240101_a".into()),
                dry_run: false
            })
        );
    }

    #[test]
    fn down_requires_target_or_all() {
        assert!(Cli::try_parse_from(["strata", "down"]).is_err());
        assert!(Cli::try_parse_from(["strata", "down", "--all", "--target", "x"]).is_err());

        let cli = Cli::try_parse_from(["strata", "down", "--all", "--dry-run"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Down(DownArgs {
                target: None,
                all: true,
                dry_run: true
            })
        );
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "strata",
            "--database",
            "/tmp/x.db",
            "--log-level",
            "debug",
            "status",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(
            config.database.path.as_deref(),
            Some(std::path::Path::new("/tmp/x.db"))
        );
        assert_eq!(config.log.level, "debug");
        assert_eq!(cli.command, Commands::Status);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
