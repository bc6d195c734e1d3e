//! Command-line entry point for api-harvest
//!
//! The process exit code is derived from the run outcome or the error:
//! 0 exported, 3 no records, 2 configuration error, 10 source error,
//! 11 storage error, 12 schema error, 13 cancelled, 1 anything else.

use api_harvest::{Config, Error, Pipeline, RunReport, ToExitCode};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Harvest a paginated REST collection into Parquet and CSV
#[derive(Debug, Parser)]
#[command(name = "api-harvest", version, about)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collection endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Records requested per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Record-count ceiling
    #[arg(long)]
    max_records: Option<usize>,

    /// Maximum number of pages to request
    #[arg(long)]
    max_pages: Option<u32>,

    /// Parquet checkpoint directory
    #[arg(long)]
    table_dir: Option<PathBuf>,

    /// CSV export file
    #[arg(long)]
    csv_path: Option<PathBuf>,

    /// Drop records repeating this field's value
    #[arg(long)]
    dedup_key: Option<String>,

    /// Skip acquisition and re-export the existing checkpoint
    #[arg(long)]
    export_only: bool,
}

impl Cli {
    fn into_config(self) -> Result<(Config, bool), Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(base_url) = self.base_url {
            config.source.base_url = base_url;
        }
        if let Some(page_size) = self.page_size {
            config.source.page_size = page_size;
        }
        if let Some(max_records) = self.max_records {
            config.source.max_records = max_records;
        }
        if self.max_pages.is_some() {
            config.source.max_pages = self.max_pages;
        }
        if let Some(table_dir) = self.table_dir {
            config.output.table_dir = table_dir;
        }
        if let Some(csv_path) = self.csv_path {
            config.output.csv_path = csv_path;
        }
        if self.dedup_key.is_some() {
            config.source.dedup_key = self.dedup_key;
        }

        config.validate()?;
        Ok((config, self.export_only))
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(report) => {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!(error = %e, "Could not serialize run report"),
            }
            report.outcome.exit_code()
        }
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "Harvest failed");
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<RunReport, Error> {
    let (config, export_only) = cli.into_config()?;
    let pipeline = Pipeline::new(config)?;

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C signal, cancelling run");
                cancel.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
        }
    });

    if export_only {
        pipeline.export().await
    } else {
        pipeline.run().await
    }
}
