//! ordersync library
//!
//! Propagates field-level changes from a PostgreSQL query or a directory of
//! CSV files into Elasticsearch-compatible indexes, as partial updates keyed
//! by the order's business identifier.
//!
//! # Overview
//!
//! - **Schema**: destination mapping flattened into a [`schema::CanonicalFieldSet`]
//! - **Sources**: offset-paginated SQL ([`source::SqlSource`]) and streamed CSV ([`source::CsvFile`])
//! - **Projection**: record to partial document ([`projector`])
//! - **Dedup**: run-scoped business key tracking for CSV runs ([`dedup`])
//! - **Writer**: `_bulk` update requests with per-item accounting ([`writer`])
//! - **Pipeline**: the driver tying it together ([`pipeline::SyncPipeline`])
//!
//! Recoverable problems are handed to a [`reporter::Reporter`]; errors that
//! end a file or a run are [`SyncError`]s.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cli;
pub mod config;
pub mod dedup;
pub mod destination;
pub mod error;
pub mod pipeline;
pub mod projector;
pub mod record;
pub mod reporter;
pub mod schema;
pub mod source;
pub mod validation;
pub mod writer;

// Re-export commonly used types
pub use cli::{Cli, Command};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use pipeline::{PipelineSettings, RunFailure, RunState, RunSummary, SourceMode, SyncPipeline};
pub use record::Record;
