use anyhow::{Context, Result};
use serde::Serialize;
use strata_common::Direction;
use strata_config::AppConfig;
use strata_db::{
    AppliedStore, Migration, MigrationRunner, Registry, RunReport, StatusReport, connection,
};
use tracing::info;

use crate::cli::{Cli, Commands};

#[derive(Serialize)]
struct Plan<'a> {
    direction: Direction,
    migrations: Vec<&'a str>,
}

pub fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let registry = Registry::builtin().context("migration registry is invalid")?;
    let store = AppliedStore::new(config.migrations.table.as_str())?;

    let db_path = config.database.resolved_path();
    let mut conn = connection::open(&db_path, &config.database)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let mut runner = MigrationRunner::new(&registry).with_store(store);

    match &cli.command {
        Commands::Status => {
            let report = runner.status(&conn)?;
            print_status(&report, cli.json)
        }
        Commands::Up(args) if args.dry_run => {
            let plan = runner.plan_up(&conn, args.target.as_deref())?;
            print_plan(Direction::Up, &plan, cli.json)
        }
        Commands::Up(args) => {
            let report = runner.up(&mut conn, args.target.as_deref());
            finish(report, cli.json)
        }
        Commands::Down(args) if args.dry_run => {
            let plan = runner.plan_down(&conn, args.target.as_deref())?;
            print_plan(Direction::Down, &plan, cli.json)
        }
        Commands::Down(args) => {
            let report = runner.down(&mut conn, args.target.as_deref());
            finish(report, cli.json)
        }
        Commands::Ensure => {
            let report = runner.ensure_latest(&mut conn);
            finish(report, cli.json)
        }
    }
}

fn finish(report: strata_common::Result<RunReport>, json: bool) -> Result<()> {
    // Reported once, by main.
    let report =
        report.context("migration run failed; database left at last committed migration")?;

    info!(
        "{} migration(s) {}",
        report.completed.len(),
        match report.direction {
            Direction::Up => "applied",
            Direction::Down => "reverted",
        }
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.completed.is_empty() {
        println!("Nothing to do.");
    }
    for id in &report.completed {
        println!("  {} {id}", report.direction);
    }
    if report.interrupted {
        println!("Interrupted before all migrations ran.");
    }
    Ok(())
}

fn print_status(report: &StatusReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let width = report
        .migrations
        .iter()
        .map(|m| m.id.len())
        .max()
        .unwrap_or(0);
    for m in &report.migrations {
        let mark = if m.applied { "x" } else { " " };
        let when = m
            .applied_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "pending".to_string());
        println!("  [{mark}] {:<width$}  {when}", m.id);
    }

    if !report.is_consistent() {
        println!();
        println!("Applied state needs attention (up/down are blocked):");
        for issue in &report.issues {
            println!("  ! {issue}");
        }
    }
    Ok(())
}

fn print_plan(direction: Direction, plan: &[&Migration], json: bool) -> Result<()> {
    if json {
        let plan = Plan {
            direction,
            migrations: plan.iter().map(|m| m.id).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("Nothing to do.");
    }
    for m in plan {
        println!("  would {direction} {}", m.id);
    }
    Ok(())
}
