//! csvload - checkpointed CSV to PostgreSQL loader

use anyhow::{Context, Result};
use clap::Parser;
use csvload::{checkpoint::FreshnessPolicy, config::LoaderConfig, db, pipeline::Ingestor};
use csvload_common::logging::{init_logging, LogConfig, LogLevel};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Every flag is optional; without arguments the loader runs with the
/// configuration found in the environment.
#[derive(Parser, Debug)]
#[command(name = "csvload")]
#[command(author, version, about = "Load a directory of CSV files into PostgreSQL")]
struct Cli {
    /// Directory to scan (overrides CSVLOAD_SOURCE_DIR)
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Destination schema (overrides CSVLOAD_DB_SCHEMA)
    #[arg(long)]
    schema: Option<String>,

    /// Freshness policy: older-than-checkpoint or newer-than-checkpoint
    /// (overrides CSVLOAD_FRESHNESS)
    #[arg(long)]
    freshness: Option<FreshnessPolicy>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("csvload")
        .filter_directives("sqlx=warn")
        .build();

    let log_config = with_env_overrides(log_config);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    if let Err(e) = run(cli).await {
        error!(error = %format!("{:#}", e), "Ingestion failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = LoaderConfig::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, cli);
    config.validate()?;

    info!(
        host = %config.database.host,
        database = %config.database.database,
        schema = %config.database.schema,
        source_dir = %config.source.dir.display(),
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database).await?;

    let ingestor = Ingestor::new(pool.clone(), config);
    ingestor.prepare().await?;
    ingestor.run().await?;

    pool.close().await;
    Ok(())
}

/// Environment variables take precedence; invalid values are reported and ignored
fn with_env_overrides(log_config: LogConfig) -> LogConfig {
    match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment variables: {}", e);
            log_config
        },
    }
}

/// Command-line flags win over the environment
fn apply_overrides(config: &mut LoaderConfig, cli: Cli) {
    if let Some(dir) = cli.source_dir {
        config.source.dir = dir;
    }
    if let Some(schema) = cli.schema {
        config.database.schema = schema;
    }
    if let Some(policy) = cli.freshness {
        config.freshness = policy;
    }
}
