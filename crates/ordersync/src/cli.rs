//! Command-line interface

use crate::config::{split_list, SyncConfig};
use crate::pipeline::{RunSummary, SourceMode};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ordersync - propagate order changes into search indexes
#[derive(Parser, Debug)]
#[command(name = "ordersync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, env = "ORDERSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// How the run summary is printed
    #[arg(long, value_enum, default_value_t = SummaryFormat::Table, global = true)]
    pub summary: SummaryFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Page through a PostgreSQL query
    Sql {
        /// Connection string
        #[arg(long)]
        database_url: Option<String>,

        /// Base query; ordered by the business key and paginated
        #[arg(long)]
        query: Option<String>,

        /// Comma-separated fields to propagate
        #[arg(long)]
        fields: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Stream every CSV file in a directory
    Csv {
        /// Directory holding the CSV files
        #[arg(long)]
        dir: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Overrides shared by both modes
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Records per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Destination index; repeat for several
    #[arg(long = "index")]
    pub indexes: Vec<String>,

    /// Destination base URL
    #[arg(long)]
    pub destination_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    Table,
    Json,
}

impl Command {
    pub fn mode(&self) -> SourceMode {
        match self {
            Command::Sql { .. } => SourceMode::Sql,
            Command::Csv { .. } => SourceMode::Csv,
        }
    }

    /// Apply command-line values on top of file and environment values
    pub fn apply_to(&self, config: &mut SyncConfig) {
        let common = match self {
            Command::Sql {
                database_url,
                query,
                fields,
                common,
            } => {
                if let Some(url) = database_url {
                    config.source.database_url = Some(url.clone());
                }
                if let Some(query) = query {
                    config.source.query = Some(query.clone());
                }
                if let Some(fields) = fields {
                    config.update_fields = split_list(fields);
                }
                common
            },
            Command::Csv { dir, common } => {
                if let Some(dir) = dir {
                    config.source.csv_dir = Some(dir.clone());
                }
                common
            },
        };

        if let Some(size) = common.batch_size {
            config.batch_size = size;
        }
        if !common.indexes.is_empty() {
            config.destination.indexes = common.indexes.clone();
        }
        if let Some(url) = &common.destination_url {
            config.destination.url = url.clone();
        }
    }
}

/// Render the summary as a two-column table
pub fn summary_table(summary: &RunSummary) -> comfy_table::Table {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Counter", "Value"]);

    table.add_row(vec!["State".to_string(), summary.state.to_string()]);
    table.add_row(vec!["Batches".to_string(), summary.batches.to_string()]);
    table.add_row(vec!["Records read".to_string(), summary.records_read.to_string()]);
    table.add_row(vec![
        "Documents submitted".to_string(),
        summary.documents_submitted.to_string(),
    ]);
    table.add_row(vec![
        "Documents updated".to_string(),
        summary.documents_updated.to_string(),
    ]);
    table.add_row(vec!["Item errors".to_string(), summary.item_errors.to_string()]);
    table.add_row(vec!["Missing keys".to_string(), summary.missing_keys.to_string()]);
    table.add_row(vec!["Missing fields".to_string(), summary.missing_fields.to_string()]);

    if summary.duplicates_skipped > 0 || summary.files_processed > 0 || summary.files_failed > 0 {
        table.add_row(vec![
            "Duplicates skipped".to_string(),
            summary.duplicates_skipped.to_string(),
        ]);
        table.add_row(vec![
            "Files processed".to_string(),
            summary.files_processed.to_string(),
        ]);
        table.add_row(vec!["Files failed".to_string(), summary.files_failed.to_string()]);
    }

    if !summary.excluded_fields.is_empty() {
        table.add_row(vec![
            "Excluded fields".to_string(),
            summary.excluded_fields.join(", "),
        ]);
    }

    table
}
