//! Pipeline driver
//!
//! Runs one synchronization from schema discovery to completion:
//!
//! ```text
//! Idle -> Discovering -> Paginating     -> Completed
//!                     -> StreamingFiles -> Completed
//!        (any fatal error)              -> Failed
//! ```
//!
//! Everything is sequential. A batch is written to every index before the
//! next one is read, so an aborted run leaves earlier batches applied and
//! later ones untouched.

use crate::config::SyncConfig;
use crate::dedup::DedupTracker;
use crate::destination::Destination;
use crate::error::{Result, SyncError};
use crate::projector::project_batch;
use crate::reporter::{Reporter, SyncEvent};
use crate::schema::{self, CanonicalFieldSet};
use crate::source::{list_csv_files, CsvFile, RecordSource};
use crate::validation::validate_headers;
use crate::writer::{BatchOutcome, BulkWriter};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Sql,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Discovering,
    Paginating,
    StreamingFiles,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Discovering => "discovering",
            RunState::Paginating => "paginating",
            RunState::StreamingFiles => "streaming_files",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the driver does with an error raised while processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Count the current file as failed and continue with the next one
    SkipFile,
    /// Stop the run
    AbortRun,
}

/// Decide how far an error reaches
///
/// In SQL mode every error ends the run. In CSV mode problems confined to
/// one file skip that file; a bulk transport failure does too unless
/// `csv_transport_aborts` is set.
pub fn disposition(error: &SyncError, mode: SourceMode, csv_transport_aborts: bool) -> Disposition {
    match (mode, error) {
        (SourceMode::Sql, _) => Disposition::AbortRun,
        (SourceMode::Csv, SyncError::SchemaMismatch { .. })
        | (SourceMode::Csv, SyncError::Io { .. })
        | (SourceMode::Csv, SyncError::Csv { .. }) => Disposition::SkipFile,
        (SourceMode::Csv, SyncError::BulkTransport { .. }) if !csv_transport_aborts => {
            Disposition::SkipFile
        },
        (SourceMode::Csv, _) => Disposition::AbortRun,
    }
}

/// Progress counters for one run
///
/// Document counters are summed over every configured index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub batches: u64,
    pub records_read: u64,
    pub documents_submitted: u64,
    pub documents_updated: u64,
    pub item_errors: u64,
    pub missing_keys: u64,
    pub missing_fields: u64,
    pub duplicates_skipped: u64,
    pub files_processed: u64,
    pub files_failed: u64,
    pub excluded_fields: Vec<String>,
}

impl RunSummary {
    /// Completed with nothing rejected, dropped or skipped
    pub fn is_clean(&self) -> bool {
        self.state == RunState::Completed
            && self.item_errors == 0
            && self.missing_keys == 0
            && self.files_failed == 0
    }

    fn record_batch(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.record_documents(outcome);
    }

    /// Document counters only; a batch cut short by a transport failure
    /// lands here without counting as a batch
    fn record_documents(&mut self, outcome: &BatchOutcome) {
        self.documents_submitted += outcome.attempted() as u64;
        self.documents_updated += outcome.succeeded() as u64;
        self.item_errors += outcome.failed() as u64;
        self.missing_keys += outcome.missing_keys as u64;
    }
}

/// A run that ended in `Failed`, with the progress made before it
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: SyncError,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub indexes: Vec<String>,
    pub batch_size: usize,
    pub business_key_field: String,
    pub csv_transport_failure_aborts_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            indexes: config.destination.indexes.clone(),
            batch_size: config.batch_size.max(1),
            business_key_field: config.business_key_field.clone(),
            csv_transport_failure_aborts_run: config.csv_transport_failure_aborts_run,
        }
    }
}

pub struct SyncPipeline<'a> {
    destination: &'a dyn Destination,
    reporter: &'a dyn Reporter,
    settings: PipelineSettings,
    state: RunState,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        destination: &'a dyn Destination,
        reporter: &'a dyn Reporter,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            destination,
            reporter,
            settings,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Page through `source` and propagate `update_fields`
    #[tracing::instrument(skip_all, fields(mode = "sql", indexes = %self.settings.indexes.join(",")))]
    pub async fn run_sql<S>(
        &mut self,
        source: &mut S,
        update_fields: &[String],
    ) -> std::result::Result<RunSummary, RunFailure>
    where
        S: RecordSource + ?Sized,
    {
        let mut summary = RunSummary::default();
        let result = self.sync_sql(source, update_fields, &mut summary).await;
        self.finish(result, summary)
    }

    /// Stream every CSV file in `dir`, each header row naming its fields
    #[tracing::instrument(skip_all, fields(mode = "csv", dir = %dir.display()))]
    pub async fn run_csv(&mut self, dir: &Path) -> std::result::Result<RunSummary, RunFailure> {
        let mut summary = RunSummary::default();
        let result = self.sync_csv(dir, &mut summary).await;
        self.finish(result, summary)
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }

    fn finish(
        &mut self,
        result: Result<()>,
        mut summary: RunSummary,
    ) -> std::result::Result<RunSummary, RunFailure> {
        match result {
            Ok(()) => {
                self.transition(RunState::Completed);
                summary.state = RunState::Completed;
                info!(
                    batches = summary.batches,
                    records = summary.records_read,
                    updated = summary.documents_updated,
                    item_errors = summary.item_errors,
                    "Run completed"
                );
                Ok(summary)
            },
            Err(error) => {
                self.transition(RunState::Failed);
                summary.state = RunState::Failed;
                error!(kind = error.kind(), error = %error, batches = summary.batches, "Run failed");
                Err(RunFailure { error, summary })
            },
        }
    }

    async fn discover(&mut self) -> Result<CanonicalFieldSet> {
        self.transition(RunState::Discovering);
        schema::discover_all(self.destination, &self.settings.indexes).await
    }

    async fn sync_sql<S>(
        &mut self,
        source: &mut S,
        update_fields: &[String],
        summary: &mut RunSummary,
    ) -> Result<()>
    where
        S: RecordSource + ?Sized,
    {
        let canonical = self.discover().await?;
        let fields = self.effective_fields(update_fields, &canonical, summary)?;
        self.transition(RunState::Paginating);

        let writer = BulkWriter::new(self.destination, self.reporter);
        let key_field = self.settings.business_key_field.as_str();
        let limit = self.settings.batch_size as u64;
        let mut offset = 0u64;

        loop {
            let records = source.fetch(offset, limit).await?;
            if records.is_empty() {
                debug!(offset, "Source exhausted");
                return Ok(());
            }
            let fetched = records.len() as u64;
            summary.records_read += fetched;

            let projection = project_batch(&records, key_field, &fields, self.reporter);
            summary.missing_fields += projection.missing_fields as u64;

            let outcome = match writer
                .write_batch(&self.settings.indexes, &projection.documents, &fields)
                .await
            {
                Ok(outcome) => outcome,
                Err(failure) => {
                    summary.record_documents(&failure.partial);
                    return Err(failure.error);
                },
            };
            summary.record_batch(&outcome);

            offset += fetched;
            self.reporter.report(SyncEvent::Progress {
                batches: summary.batches,
                records: summary.records_read,
            });
        }
    }

    /// Configured fields known to the destination, in canonical spelling
    fn effective_fields(
        &self,
        requested: &[String],
        canonical: &CanonicalFieldSet,
        summary: &mut RunSummary,
    ) -> Result<Vec<String>> {
        let mut fields: Vec<String> = Vec::with_capacity(requested.len());

        for field in requested {
            match canonical.resolve_ignore_case(field) {
                Some(name) => {
                    if !fields.iter().any(|f| f == name) {
                        fields.push(name.to_string());
                    }
                },
                None => {
                    summary.excluded_fields.push(field.clone());
                    self.reporter.report(SyncEvent::FieldExcluded {
                        field: field.clone(),
                    });
                },
            }
        }

        if fields.is_empty() {
            return Err(SyncError::NoSyncableFields {
                requested: requested.to_vec(),
            });
        }

        Ok(fields)
    }

    async fn sync_csv(&mut self, dir: &Path, summary: &mut RunSummary) -> Result<()> {
        let canonical = self.discover().await?;
        self.transition(RunState::StreamingFiles);

        let files = list_csv_files(dir)?;
        if files.is_empty() {
            warn!(dir = %dir.display(), "No CSV files found");
        }

        let writer = BulkWriter::new(self.destination, self.reporter);
        let mut dedup = DedupTracker::new();

        for file in files {
            self.reporter.report(SyncEvent::FileStarted { file: file.clone() });

            let span = info_span!("csv_file", file = %file.display());
            let result = self
                .sync_file(&file, &canonical, &mut dedup, &writer, summary)
                .instrument(span)
                .await;

            match result {
                Ok(records) => {
                    summary.files_processed += 1;
                    self.reporter
                        .report(SyncEvent::FileCompleted { file, records });
                },
                Err(error) => {
                    summary.files_failed += 1;
                    match disposition(
                        &error,
                        SourceMode::Csv,
                        self.settings.csv_transport_failure_aborts_run,
                    ) {
                        Disposition::SkipFile => {
                            self.reporter.report(SyncEvent::FileFailed {
                                file,
                                reason: error.to_string(),
                            });
                        },
                        Disposition::AbortRun => return Err(error),
                    }
                },
            }
        }

        debug!(distinct_keys = dedup.len(), "All files processed");
        Ok(())
    }

    /// Returns the number of rows read from the file
    async fn sync_file(
        &self,
        path: &Path,
        canonical: &CanonicalFieldSet,
        dedup: &mut DedupTracker,
        writer: &BulkWriter<'_>,
        summary: &mut RunSummary,
    ) -> Result<u64> {
        let file = CsvFile::open(path, self.settings.batch_size)?;
        let fields = validate_headers(path, file.headers(), canonical)?;
        let key_field = self.settings.business_key_field.as_str();
        let mut rows = 0u64;

        for batch in file.batches(self.reporter) {
            let mut records = batch?;
            rows += records.len() as u64;
            summary.records_read += records.len() as u64;
            summary.duplicates_skipped +=
                dedup.retain_unseen(&mut records, key_field, self.reporter) as u64;

            let projection = project_batch(&records, key_field, &fields, self.reporter);
            summary.missing_fields += projection.missing_fields as u64;

            let outcome = match writer
                .write_batch(&self.settings.indexes, &projection.documents, &fields)
                .await
            {
                Ok(outcome) => outcome,
                Err(failure) => {
                    summary.record_documents(&failure.partial);
                    return Err(failure.error);
                },
            };
            summary.record_batch(&outcome);

            self.reporter.report(SyncEvent::Progress {
                batches: summary.batches,
                records: summary.records_read,
            });
        }

        Ok(rows)
    }
}
