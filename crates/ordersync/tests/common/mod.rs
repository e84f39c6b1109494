//! Shared fakes for the pipeline integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use ordersync::destination::{
    BulkItemError, BulkItemResult, BulkResponse, BulkResponseItem, BulkUpdate, Destination,
    DestinationError, MappingResponse,
};
use ordersync::record::SqlRecord;
use ordersync::source::RecordSource;
use ordersync::{PipelineSettings, Record, SyncError};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ordersync=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn settings(indexes: &[&str], batch_size: usize) -> PipelineSettings {
    PipelineSettings {
        indexes: indexes.iter().map(|s| s.to_string()).collect(),
        batch_size,
        business_key_field: "OrderId".to_string(),
        csv_transport_failure_aborts_run: false,
    }
}

pub fn fields(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// In-memory index store
///
/// Every bulk call is recorded, including the one made to fail.
#[derive(Default)]
pub struct FakeDestination {
    mappings: HashMap<String, Vec<String>>,
    reject: HashSet<String>,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<Vec<BulkUpdate>>>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: &str, fields: &[&str]) -> Self {
        self.mappings
            .insert(index.to_string(), fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Reject updates for these ids as missing documents
    pub fn rejecting(mut self, ids: &[&str]) -> Self {
        self.reject = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Fail the n-th bulk call (1-based) with a 503
    pub fn failing_on_bulk_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn bulk_calls(&self) -> Vec<Vec<BulkUpdate>> {
        self.calls.lock().unwrap().clone()
    }

    /// Ids sent to `index`, in order
    pub fn submitted_ids(&self, index: &str) -> Vec<String> {
        self.bulk_calls()
            .iter()
            .flatten()
            .filter(|u| u.index == index)
            .map(|u| u.id.clone())
            .collect()
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn get_mapping(&self, index: &str) -> Result<MappingResponse, DestinationError> {
        let fields = self
            .mappings
            .get(index)
            .ok_or_else(|| DestinationError::IndexNotFound(index.to_string()))?;

        let properties: serde_json::Map<String, Value> = fields
            .iter()
            .map(|f| (f.clone(), json!({"type": "keyword"})))
            .collect();
        let mut response = serde_json::Map::new();
        response.insert(
            index.to_string(),
            json!({"mappings": {"properties": properties}}),
        );
        Ok(serde_json::from_value(Value::Object(response)).unwrap())
    }

    async fn bulk(&self, updates: &[BulkUpdate]) -> Result<BulkResponse, DestinationError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(updates.to_vec());
            calls.len()
        };

        if self.fail_on_call == Some(call) {
            return Err(DestinationError::Status {
                url: "http://fake:9200/_bulk".to_string(),
                status: 503,
                body: "cluster unavailable".to_string(),
            });
        }

        let mut errors = false;
        let items = updates
            .iter()
            .map(|u| {
                let rejected = self.reject.contains(&u.id);
                errors |= rejected;
                BulkResponseItem {
                    update: BulkItemResult {
                        index: Some(u.index.clone()),
                        id: Some(u.id.clone()),
                        status: if rejected { 404 } else { 200 },
                        error: rejected.then(|| BulkItemError {
                            error_type: "document_missing_exception".to_string(),
                            reason: Some(format!("[{}]: document missing", u.id)),
                        }),
                    },
                }
            })
            .collect();

        Ok(BulkResponse {
            took: 1,
            errors,
            items,
        })
    }
}

/// Paginated view over a fixed row list
#[derive(Default)]
pub struct FakeSource {
    rows: Vec<Record>,
    fail_at_offset: Option<u64>,
    pub fetches: Vec<(u64, u64)>,
}

impl FakeSource {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// `count` orders with ids `1..=count`
    pub fn orders(count: usize) -> Self {
        Self::new((1..=count).map(order).collect())
    }

    pub fn failing_at(mut self, offset: u64) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch(&mut self, offset: u64, limit: u64) -> ordersync::Result<Vec<Record>> {
        self.fetches.push((offset, limit));
        if self.fail_at_offset == Some(offset) {
            return Err(SyncError::SourceQuery(sqlx::Error::PoolTimedOut));
        }

        let start = (offset as usize).min(self.rows.len());
        let end = (start + limit as usize).min(self.rows.len());
        Ok(self.rows[start..end].to_vec())
    }
}

pub fn order(id: usize) -> Record {
    sql_row(&[
        ("OrderId", json!(id)),
        ("Status", json!("shipped")),
        ("Total", json!(id as f64 * 10.5)),
    ])
}

pub fn sql_row(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<SqlRecord>()
        .into()
}
