//! CLI entry point for the epitrack tool.
//!
//! Provides subcommands for building CSV datasets from the fixed
//! cumulative time-series files or from the day-probed daily report files.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use epitrack::{
    dataset::{default_datasets, load_datasets},
    fetch::BasicClient,
    geo::Normalizer,
    ingest::{ingest_daily, ingest_series, series_epoch},
    output::{Schema, write_dataset, write_last_updated},
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "epitrack")]
#[command(about = "Aggregate daily epidemiological reports into CSV datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build datasets from the three fixed cumulative time-series files
    Series {
        /// Base URL or local directory holding the source files
        #[arg(value_name = "URL_OR_DIR")]
        source: String,

        /// Directory to write one CSV per dataset into
        #[arg(short, long, default_value = "out")]
        output_dir: String,

        /// JSON dataset config; built-in defaults when omitted
        #[arg(short, long)]
        datasets: Option<String>,
    },
    /// Build datasets from daily report files, probing dates until one is missing
    Daily {
        /// Base URL or local directory holding MM-DD-YYYY.csv files
        #[arg(value_name = "URL_OR_DIR")]
        source: String,

        /// Directory to write one CSV per dataset into
        #[arg(short, long, default_value = "out")]
        output_dir: String,

        /// JSON dataset config; built-in defaults when omitted
        #[arg(short, long)]
        datasets: Option<String>,

        /// First date to probe (YYYY-MM-DD)
        #[arg(long, default_value = "2020-01-22")]
        start: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/epitrack.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("epitrack.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Run failed");
        return Err(e);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Series {
            source,
            output_dir,
            datasets,
        } => {
            let policies = match datasets {
                Some(path) => load_datasets(&path)?,
                None => default_datasets(),
            };
            let client = BasicClient::new();

            info!(source, epoch = %series_epoch(), "Ingesting cumulative time-series files");
            let outcome = ingest_series(&client, &source, policies).await?;

            write_outputs(&output_dir, &outcome, Schema::Simple)?;
        }
        Commands::Daily {
            source,
            output_dir,
            datasets,
            start,
        } => {
            let policies = match datasets {
                Some(path) => load_datasets(&path)?,
                None => default_datasets(),
            };
            let client = BasicClient::new();
            let normalizer = Normalizer::new();

            info!(source, %start, "Ingesting daily report files");
            let outcome = ingest_daily(&client, &source, start, &normalizer, policies).await?;

            write_outputs(&output_dir, &outcome, Schema::Granular)?;
        }
    }

    Ok(())
}

/// Writes one CSV per dataset plus the shared "last updated" marker.
/// Each file is written to completion or not at all.
fn write_outputs(
    output_dir: &str,
    outcome: &epitrack::ingest::IngestOutcome,
    schema: Schema,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    for build in &outcome.builds {
        let path = format!("{}/{}.csv", output_dir, build.policy.name);
        write_dataset(&path, &build.series, schema)?;
    }
    write_last_updated(&format!("{output_dir}/lastupdate.txt"), outcome.last_date)?;

    info!(
        output_dir,
        datasets = outcome.builds.len(),
        "All datasets written"
    );
    Ok(())
}
