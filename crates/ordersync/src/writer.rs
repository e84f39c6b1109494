//! Bulk partial-update dispatch
//!
//! A batch of projected documents becomes one `_bulk` request per
//! destination index. Item-level rejections are reported and counted; only
//! a failure of the request itself is returned as an error.

use crate::destination::{BulkResponse, BulkUpdate, Destination};
use crate::error::{Result, SyncError};
use crate::projector::ProjectedDocument;
use crate::reporter::{Reporter, SyncEvent};
use serde_json::Map;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Result of one bulk submission to one index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub index: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
}

impl BulkOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Result of writing one batch to every configured index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Documents dropped for lacking a business key, counted once per batch
    pub missing_keys: usize,
    pub per_index: Vec<BulkOutcome>,
}

impl BatchOutcome {
    pub fn attempted(&self) -> usize {
        self.per_index.iter().map(|o| o.attempted).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.per_index.iter().map(|o| o.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.per_index.iter().map(BulkOutcome::failed).sum()
    }
}

/// A transport failure part way through a batch
///
/// `partial` holds the indexes that were written before `error`, so their
/// applied updates still reach the run summary.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct BatchFailure {
    pub partial: BatchOutcome,
    #[source]
    pub error: SyncError,
}

pub struct BulkWriter<'a> {
    destination: &'a dyn Destination,
    reporter: &'a dyn Reporter,
}

impl<'a> BulkWriter<'a> {
    pub fn new(destination: &'a dyn Destination, reporter: &'a dyn Reporter) -> Self {
        Self {
            destination,
            reporter,
        }
    }

    /// Submit `documents` to a single index
    pub async fn submit(
        &self,
        index: &str,
        documents: &[ProjectedDocument],
        update_fields: &[String],
    ) -> Result<BulkOutcome> {
        let (keyed, _) = self.partition(documents);
        self.send(index, &keyed, update_fields).await
    }

    /// Submit the same batch to every index, in order
    ///
    /// Stops at the first transport failure; indexes before it keep their
    /// updates and are returned in [`BatchFailure::partial`].
    pub async fn write_batch(
        &self,
        indexes: &[String],
        documents: &[ProjectedDocument],
        update_fields: &[String],
    ) -> std::result::Result<BatchOutcome, BatchFailure> {
        let (keyed, missing_keys) = self.partition(documents);

        let mut outcome = BatchOutcome {
            missing_keys,
            per_index: Vec::with_capacity(indexes.len()),
        };
        for index in indexes {
            match self.send(index, &keyed, update_fields).await {
                Ok(written) => outcome.per_index.push(written),
                Err(error) => {
                    return Err(BatchFailure {
                        partial: outcome,
                        error,
                    })
                },
            }
        }

        Ok(outcome)
    }

    fn partition<'d>(&self, documents: &'d [ProjectedDocument]) -> (Vec<&'d ProjectedDocument>, usize) {
        let mut keyed = Vec::with_capacity(documents.len());
        let mut missing = 0;

        for (position, document) in documents.iter().enumerate() {
            if document.business_key().is_some() {
                keyed.push(document);
            } else {
                missing += 1;
                self.reporter.report(SyncEvent::BusinessKeyMissing {
                    position,
                    location: document.location(),
                });
            }
        }

        (keyed, missing)
    }

    async fn send(
        &self,
        index: &str,
        documents: &[&ProjectedDocument],
        update_fields: &[String],
    ) -> Result<BulkOutcome> {
        let updates = build_updates(index, documents, update_fields);
        let mut outcome = BulkOutcome {
            index: index.to_string(),
            attempted: updates.len(),
            ..BulkOutcome::default()
        };

        if updates.is_empty() {
            debug!(index = %index, "Nothing to submit");
            return Ok(outcome);
        }

        let response = match self.destination.bulk(&updates).await {
            Ok(response) => response,
            Err(e) => {
                self.reporter.report(SyncEvent::TransportFailed {
                    index: index.to_string(),
                    reason: e.to_string(),
                });
                return Err(SyncError::bulk_transport(index, e));
            },
        };

        outcome.failures = reconcile(&updates, &response);
        outcome.succeeded = outcome.attempted - outcome.failures.len();

        for failure in &outcome.failures {
            self.reporter.report(SyncEvent::ItemFailed {
                index: index.to_string(),
                order_id: failure.id.clone(),
                reason: failure.reason.clone(),
            });
        }
        self.reporter.report(SyncEvent::BatchWritten {
            index: index.to_string(),
            attempted: outcome.attempted,
            succeeded: outcome.succeeded,
            failed: outcome.failed(),
        });

        Ok(outcome)
    }
}

/// One update per keyed document, carrying only the update fields it has
fn build_updates(
    index: &str,
    documents: &[&ProjectedDocument],
    update_fields: &[String],
) -> Vec<BulkUpdate> {
    documents
        .iter()
        .filter_map(|document| {
            let key = document.business_key()?;
            let doc: Map<_, _> = update_fields
                .iter()
                .filter_map(|field| document.get(field).map(|v| (field.clone(), v.clone())))
                .collect();
            Some(BulkUpdate {
                index: index.to_string(),
                id: key.to_string(),
                doc,
            })
        })
        .collect()
}

/// Match response items to sent updates by position
fn reconcile(updates: &[BulkUpdate], response: &BulkResponse) -> Vec<ItemFailure> {
    if !response.errors {
        return Vec::new();
    }

    updates
        .iter()
        .enumerate()
        .filter_map(|(position, update)| match response.items.get(position) {
            Some(item) => {
                let result = &item.update;
                let id = result
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| update.id.clone());
                match &result.error {
                    Some(error) => Some(ItemFailure {
                        id,
                        reason: error.describe(),
                    }),
                    None if !(200..300).contains(&result.status) => Some(ItemFailure {
                        id,
                        reason: format!("status {}", result.status),
                    }),
                    None => None,
                }
            },
            None => Some(ItemFailure {
                id: update.id.clone(),
                reason: "no item result in bulk response".to_string(),
            }),
        })
        .collect()
}
