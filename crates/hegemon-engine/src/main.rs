//! Tick engine binary for the Hegemon world simulation.
//!
//! Each invocation runs one pipeline once and exits; a scheduler (cron,
//! systemd timer) is expected to call it every period.
//!
//! ```bash
//! hegemon-engine hourly              # stability, production, upkeep, decay
//! hegemon-engine caravan --dry-run   # print the batch instead of writing it
//! hegemon-engine migrate             # apply pending schema migrations
//! ```
//!
//! # Run sequence
//!
//! 1. Load configuration from `hegemon-config.yaml` (or `--config`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL`; failure here aborts before any read
//! 4. Run the pipeline through [`TickEngine`]
//! 5. Print the dry-run trace, or the completion marker

mod error;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hegemon_core::config::LoggingConfig;
use hegemon_core::{HegemonConfig, NoVictory, RUN_COMPLETE, TickEngine, TickReport};
use hegemon_db::{PgWorldStore, PostgresConfig, PostgresPool};

use crate::error::EngineError;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "hegemon-engine")]
#[command(about = "Run one pass of the Hegemon world tick")]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = "hegemon-config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Progress, war adjudication, territory, upkeep, and decay.
    Hourly {
        /// Print the batch instead of committing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Caravan settlement and generation.
    Caravan {
        /// Print the batch instead of committing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_tracing(&config.logging);
    info!(
        config = %args.config.display(),
        upgrades = config.catalog.upgrades.len(),
        buildings = config.catalog.buildings.len(),
        "hegemon-engine starting"
    );

    let pool = PostgresPool::connect(&PostgresConfig::from_infrastructure(
        &config.infrastructure,
    ))
    .await
    .map_err(EngineError::from)
    .context("storage is unreachable")?;

    let result = run(&args.command, &config, &pool).await;
    pool.close().await;
    result
}

async fn run(command: &Command, config: &HegemonConfig, pool: &PostgresPool) -> anyhow::Result<()> {
    let store = PgWorldStore::new(pool.clone());
    let engine = TickEngine::new(config, &store);
    let now = Utc::now();
    let report = match *command {
        Command::Hourly { dry_run } => engine
            .run_hourly(&NoVictory::new(), now, dry_run)
            .await
            .map_err(EngineError::from)
            .context("hourly tick failed")?,
        Command::Caravan { dry_run } => engine
            .run_caravan(now, dry_run)
            .await
            .map_err(EngineError::from)
            .context("caravan cycle failed")?,
        Command::Migrate => {
            pool.run_migrations().await.map_err(EngineError::from)?;
            println!("{RUN_COMPLETE}");
            return Ok(());
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &TickReport) {
    for issue in &report.issues {
        eprintln!("skipped: {issue}");
    }
    if report.dry_run {
        println!("{}", report.batch);
    } else {
        info!(
            run_id = %report.run.id,
            pipeline = report.run.pipeline.as_str(),
            period = report.run.period,
            mutations = report.batch.len(),
            issues = report.issues.len(),
            "Run committed"
        );
        println!("{RUN_COMPLETE}");
    }
}

/// Load the configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<HegemonConfig, EngineError> {
    if path.exists() {
        Ok(HegemonConfig::from_file(path)?)
    } else {
        Ok(HegemonConfig::parse("{}")?)
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
