use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};
use usage_stats::catalog::config::load_catalog_path;
use usage_stats::config::load_config_path;
use usage_stats::publish::{OperationAspect, UsageAggregateRecord};
use usage_stats::{UsageConfig, UsageExtractor};
use warehouse_source::QueryKind;
use warehouse_source::providers::jsonl::JsonlSource;

const CONFIG_ENV: &str = "USAGE_STATS_CONFIG";

#[derive(Parser)]
#[command(version, about = "Dataset usage statistics from warehouse access logs")]
struct Cli {
    /// Logging verbosity (trace, debug, info, warn, error) or a filter directive.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Aggregate exported query results and print usage/operation records.
    Run(RunCmd),
    /// Print the SQL both passes would run against the warehouse.
    RenderQueries {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunCmd {
    /// Usage config TOML; defaults to $USAGE_STATS_CONFIG.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Table catalog TOML.
    #[arg(long, value_name = "FILE")]
    catalog: PathBuf,
    /// JSON-lines export of the scan query.
    #[arg(long, value_name = "FILE")]
    scan_rows: PathBuf,
    /// JSON-lines export of the operation query.
    #[arg(long, value_name = "FILE")]
    operation_rows: Option<PathBuf>,
    /// Write records here instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum OutputLine<'a> {
    Usage(&'a UsageAggregateRecord),
    Operation(&'a OperationAspect),
}

fn load_config(explicit: Option<PathBuf>) -> Result<UsageConfig> {
    let path = shared_utils::env::path_or_env(explicit, CONFIG_ENV)
        .context("--config is required (or set USAGE_STATS_CONFIG)")?;
    load_config_path(&path).with_context(|| format!("loading config from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    match cli.cmd {
        Cmd::RenderQueries { config } => {
            let cfg = load_config(config)?;
            println!("-- scan\n{}", cfg.scan_query().render().trim());
            println!("\n-- operation\n{}", cfg.operation_query().render().trim());
        }
        Cmd::Run(cmd) => run(cmd).await?,
    }

    Ok(())
}

async fn run(cmd: RunCmd) -> Result<()> {
    let mut cfg = load_config(cmd.config)?;
    let catalog = load_catalog_path(&cmd.catalog)
        .with_context(|| format!("loading catalog from {}", cmd.catalog.display()))?;

    let mut source = JsonlSource::new(cfg.page_size).with_file(QueryKind::Scan, &cmd.scan_rows);
    match &cmd.operation_rows {
        Some(path) => source = source.with_file(QueryKind::Operation, path),
        None if cfg.include_operational_stats => {
            tracing::warn!("no --operation-rows given; skipping operational stats");
            cfg.include_operational_stats = false;
        }
        None => {}
    }

    tracing::info!(
        database = %cfg.database,
        start = %cfg.start_time,
        end = %cfg.end_time,
        bucket = %cfg.bucket_duration,
        "generating usage"
    );
    let output = UsageExtractor::new(cfg).generate_usage(&source, &catalog).await?;

    let sink: Box<dyn Write> = match &cmd.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    for record in &output.usage {
        serde_json::to_writer(&mut out, &OutputLine::Usage(record))?;
        writeln!(out)?;
    }
    for aspect in &output.operations {
        serde_json::to_writer(&mut out, &OutputLine::Operation(aspect))?;
        writeln!(out)?;
    }
    out.flush()?;

    eprintln!("{}", output.report);
    Ok(())
}
