#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the park assets out-of-boundary quality check.
//!
//! Database credentials come from `DATABASE_URL` or the `PG_HOST`,
//! `PG_PORT`, `PG_DATABASE`, `PG_USER` and `PG_PASSWORD` variables.
//! Everything else comes from the embedded defaults, optionally merged
//! with a `--config` file and the flags below.

mod config;
mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use park_assets_cli_utils::MultiProgress;

use crate::config::QualityCheckConfig;
use crate::pipeline::{SourceMode, format_elapsed};

#[derive(Parser)]
#[command(
    name = "park_assets_qc",
    about = "Reports park assets located outside the reference boundary"
)]
struct Cli {
    /// TOML file merged over the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Read `<table>.geojson` files from this directory instead of Postgres
    #[arg(long, global = true)]
    offline: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every asset table and write the HTML report (default)
    Check {
        /// Boundary `GeoJSON` (overrides `boundary_path`)
        #[arg(long)]
        boundary: Option<PathBuf>,
        /// Report destination (overrides `output_path`)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Email the report even if `[email] enabled` is false
        #[arg(long)]
        email: bool,
    },
    /// List the tables a check would evaluate
    Tables,
}

#[tokio::main]
async fn main() {
    let multi = park_assets_cli_utils::init_logger();
    let start = Instant::now();

    if let Err(e) = run(Cli::parse(), &multi).await {
        log::error!("{e}");
        std::process::exit(1);
    }

    log::info!("{}", format_elapsed(start.elapsed()));
}

async fn run(cli: Cli, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = QualityCheckConfig::load(cli.config.as_deref())?;
    let mode = cli
        .offline
        .map_or(SourceMode::Postgres, SourceMode::Offline);

    let command = cli.command.unwrap_or(Commands::Check {
        boundary: None,
        output: None,
        email: false,
    });

    match command {
        Commands::Check {
            boundary,
            output,
            email,
        } => {
            if let Some(boundary) = boundary {
                config.boundary_path = boundary;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            config.email.enabled |= email;

            let today = chrono::Local::now().date_naive();
            let summary = pipeline::run(&config, &mode, multi, today).await?;

            if summary.violations == 0 {
                log::info!("No out-of-boundary assets found");
            } else {
                log::info!(
                    "{} out-of-boundary asset(s) reported in {}",
                    summary.violations,
                    summary.output_path.display()
                );
            }
            if summary.emailed {
                log::info!(
                    "Report emailed to {} recipient(s)",
                    config.email.to.len() + config.email.cc.len()
                );
            }
        }
        Commands::Tables => {
            let tables = pipeline::list_candidate_tables(&config, &mode).await?;
            println!("{:<40} SCHEMA", "TABLE");
            println!("{}", "-".repeat(50));
            for table in &tables {
                println!("{table:<40} {}", config.evaluate.schema);
            }
        }
    }

    Ok(())
}
