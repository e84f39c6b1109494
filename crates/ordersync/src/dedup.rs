//! Run-scoped deduplication for the CSV path
//!
//! A business key is synchronized at most once per run, however many files
//! or rows repeat it. The set only grows and is dropped with the run.

use crate::record::{BusinessKey, Record};
use crate::reporter::{Reporter, SyncEvent};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<BusinessKey>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_process(&self, key: &BusinessKey) -> bool {
        !self.seen.contains(key)
    }

    pub fn mark_processed(&mut self, key: BusinessKey) {
        self.seen.insert(key);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop records whose key was already processed, marking the rest
    ///
    /// Records without a key pass through untouched; the bulk writer drops
    /// and reports them. Returns the number of duplicates removed.
    pub fn retain_unseen(
        &mut self,
        records: &mut Vec<Record>,
        key_field: &str,
        reporter: &dyn Reporter,
    ) -> usize {
        let before = records.len();
        records.retain(|record| match record.business_key(key_field) {
            None => true,
            Some(key) if self.should_process(&key) => {
                self.mark_processed(key);
                true
            },
            Some(key) => {
                reporter.report(SyncEvent::DuplicateSkipped {
                    order_id: key.to_string(),
                });
                false
            },
        });
        before - records.len()
    }
}
