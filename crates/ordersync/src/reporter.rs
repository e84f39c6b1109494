//! Diagnostic side channel for the pipeline
//!
//! Components hand every recoverable problem and every progress milestone
//! to a [`Reporter`] instead of logging inline. The pipeline's control flow
//! never depends on what a reporter does with an event.

use crate::record::RecordLocation;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A requested field was absent on a record and left out of its document
    FieldMissing {
        order_id: Option<String>,
        field: String,
    },
    /// A document without a business key was dropped before submission
    ///
    /// `position` is the index within its batch.
    BusinessKeyMissing {
        position: usize,
        location: Option<RecordLocation>,
    },
    /// A configured update field is unknown to the destination
    FieldExcluded { field: String },
    /// A business key already processed earlier in the run
    DuplicateSkipped { order_id: String },
    /// A CSV row that could not be decoded
    RowSkipped {
        file: PathBuf,
        line: Option<u64>,
        reason: String,
    },
    /// The destination rejected one document of a bulk request
    ItemFailed {
        index: String,
        order_id: String,
        reason: String,
    },
    BatchWritten {
        index: String,
        attempted: usize,
        succeeded: usize,
        failed: usize,
    },
    TransportFailed { index: String, reason: String },
    FileStarted { file: PathBuf },
    FileCompleted { file: PathBuf, records: u64 },
    FileFailed { file: PathBuf, reason: String },
    Progress { batches: u64, records: u64 },
}

pub trait Reporter: Send + Sync {
    fn report(&self, event: SyncEvent);
}

/// Emits every event as a structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: SyncEvent) {
        match event {
            SyncEvent::FieldMissing { order_id, field } => {
                warn!(order_id = order_id.as_deref().unwrap_or("<none>"), field = %field, "Field missing on record, omitted from update");
            },
            SyncEvent::BusinessKeyMissing { position, location } => {
                let location = location.map_or_else(|| "unknown".to_string(), |l| l.to_string());
                warn!(position, location = %location, "Record has no business key, skipped");
            },
            SyncEvent::FieldExcluded { field } => {
                warn!(field = %field, "Update field not in destination schema, excluded");
            },
            SyncEvent::DuplicateSkipped { order_id } => {
                debug!(order_id = %order_id, "Business key already synchronized in this run, skipped");
            },
            SyncEvent::RowSkipped { file, line, reason } => {
                warn!(file = %file.display(), line, reason = %reason, "Unreadable CSV row skipped");
            },
            SyncEvent::ItemFailed {
                index,
                order_id,
                reason,
            } => {
                error!(index = %index, order_id = %order_id, reason = %reason, "Document update rejected");
            },
            SyncEvent::BatchWritten {
                index,
                attempted,
                succeeded,
                failed,
            } => {
                info!(index = %index, attempted, succeeded, failed, "Bulk request applied");
            },
            SyncEvent::TransportFailed { index, reason } => {
                error!(index = %index, reason = %reason, "Bulk request failed");
            },
            SyncEvent::FileStarted { file } => {
                info!(file = %file.display(), "Processing file");
            },
            SyncEvent::FileCompleted { file, records } => {
                info!(file = %file.display(), records, "File processed");
            },
            SyncEvent::FileFailed { file, reason } => {
                error!(file = %file.display(), reason = %reason, "File skipped");
            },
            SyncEvent::Progress { batches, records } => {
                info!(batches, records, "Progress");
            },
        }
    }
}

/// Keeps events in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
