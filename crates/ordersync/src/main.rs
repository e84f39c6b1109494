//! ordersync - main entry point

use anyhow::Context;
use clap::Parser;
use ordersync::cli::{summary_table, SummaryFormat};
use ordersync::destination::ElasticsearchClient;
use ordersync::reporter::TracingReporter;
use ordersync::source::SqlSource;
use ordersync::{
    Cli, Command, PipelineSettings, RunFailure, RunSummary, SyncConfig, SyncPipeline,
};
use ordersync_common::logging::{init_logging, LogLevel};
use std::process::ExitCode;
use tracing::{error, info};

/// Fatal error or invalid configuration
const EXIT_FAILED: u8 = 1;

/// Completed, but some documents or files were not applied
const EXIT_INCOMPLETE: u8 = 3;

type RunResult = std::result::Result<RunSummary, RunFailure>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_FAILED);
        },
    };

    let mut log_config = config.log.clone();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    // The sync still runs without logging
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e}");
            None
        },
    };

    match run(&cli, &config).await {
        Ok(Ok(summary)) => {
            print_summary(&summary, cli.summary);
            if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INCOMPLETE)
            }
        },
        Ok(Err(failure)) => {
            print_summary(&failure.summary, cli.summary);
            eprintln!("Error: {}", failure.error);
            ExitCode::from(EXIT_FAILED)
        },
        Err(e) => {
            error!(error = %format!("{e:#}"), "Sync could not start");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILED)
        },
    }
}

/// File, then environment, then command line
fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config =
        SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.command.apply_to(&mut config);
    config
        .validate(cli.command.mode())
        .context("Invalid configuration")?;
    Ok(config)
}

async fn run(cli: &Cli, config: &SyncConfig) -> anyhow::Result<RunResult> {
    let destination = ElasticsearchClient::new(&config.destination)
        .context("Failed to build destination client")?;
    let reporter = TracingReporter;
    let mut pipeline =
        SyncPipeline::new(&destination, &reporter, PipelineSettings::from_config(config));

    info!(
        mode = ?cli.command.mode(),
        destination = %destination.base_url(),
        indexes = %config.destination.indexes.join(","),
        batch_size = config.batch_size,
        "Starting sync"
    );

    let result = match &cli.command {
        Command::Sql { .. } => {
            let (Some(url), Some(query)) = (
                config.source.database_url.as_deref(),
                config.source.query.as_deref(),
            ) else {
                anyhow::bail!("source.database_url and source.query are required in sql mode");
            };

            let mut source = SqlSource::connect(
                url,
                config.source.max_connections,
                query,
                &config.business_key_field,
            )
            .await
            .context("Failed to connect to source database")?;

            pipeline.run_sql(&mut source, &config.update_fields).await
        },
        Command::Csv { .. } => {
            let Some(dir) = config.source.csv_dir.as_deref() else {
                anyhow::bail!("source.csv_dir is required in csv mode");
            };
            pipeline.run_csv(dir).await
        },
    };

    Ok(result)
}

fn print_summary(summary: &RunSummary, format: SummaryFormat) {
    match format {
        SummaryFormat::Table => {
            println!();
            println!("{}", summary_table(summary));
        },
        SummaryFormat::Json => match serde_json::to_string_pretty(summary) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: failed to render summary: {e}"),
        },
    }
}
