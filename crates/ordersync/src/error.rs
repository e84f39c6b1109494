//! Error types for the sync pipeline
//!
//! Only failures that end a unit of work live here. Per-record and
//! per-document problems (missing business key, missing field, a rejected
//! bulk item) are reported through [`crate::reporter::Reporter`] and
//! counted, never raised.

use crate::destination::DestinationError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The destination mapping could not be read or holds no fields
    #[error("Schema unavailable for index '{index}': {reason}")]
    SchemaUnavailable { index: String, reason: String },

    /// The relational source rejected or failed a query
    #[error("Source query failed: {0}")]
    SourceQuery(#[from] sqlx::Error),

    /// CSV headers that the destination schema does not know
    #[error(
        "Header mismatch in '{}': not in destination schema: {}",
        .file.display(),
        .fields.join(", ")
    )]
    SchemaMismatch { file: PathBuf, fields: Vec<String> },

    /// The bulk call itself failed (connect, timeout, auth, bad status)
    #[error("Bulk request to index '{index}' failed: {source}")]
    BulkTransport {
        index: String,
        #[source]
        source: DestinationError,
    },

    /// None of the configured update fields exist at the destination
    #[error("No configured update field exists in the destination schema (requested: {})", .requested.join(", "))]
    NoSyncableFields { requested: Vec<String> },

    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn schema_unavailable(index: impl Into<String>, reason: impl ToString) -> Self {
        Self::SchemaUnavailable {
            index: index.into(),
            reason: reason.to_string(),
        }
    }

    pub fn bulk_transport(index: impl Into<String>, source: DestinationError) -> Self {
        Self::BulkTransport {
            index: index.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-friendly name, used in logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::SchemaUnavailable { .. } => "schema_unavailable",
            SyncError::SourceQuery(_) => "source_query",
            SyncError::SchemaMismatch { .. } => "schema_mismatch",
            SyncError::BulkTransport { .. } => "bulk_transport",
            SyncError::NoSyncableFields { .. } => "no_syncable_fields",
            SyncError::Io { .. } => "io",
            SyncError::Csv { .. } => "csv",
            SyncError::Config(_) => "config",
        }
    }
}
