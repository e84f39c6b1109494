//! SQL-mode pipeline tests
//!
//! The relational source is replaced by an in-memory [`RecordSource`], so
//! these cover pagination, projection and failure handling without a
//! database.

mod common;

use common::{fields, init_tracing, order, settings, sql_row, FakeDestination, FakeSource};
use ordersync::reporter::{RecordingReporter, SyncEvent};
use ordersync::{RunState, SyncError, SyncPipeline};
use serde_json::json;

fn orders_index() -> FakeDestination {
    FakeDestination::new().with_index("orders", &["OrderId", "Status", "Total"])
}

#[tokio::test]
async fn test_empty_source_completes_without_writes() {
    init_tracing();
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(0);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 100));

    let summary = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(pipeline.state(), RunState::Completed);
    assert_eq!(summary.documents_submitted, 0);
    assert!(summary.is_clean());
    assert!(destination.bulk_calls().is_empty());
    assert_eq!(source.fetches, vec![(0, 100)]);
}

#[tokio::test]
async fn test_pagination_offsets_and_bulk_calls_per_index() {
    let destination = FakeDestination::new()
        .with_index("orders", &["OrderId", "Status"])
        .with_index("orders-replica", &["OrderId", "Status"]);
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(250);
    let mut pipeline = SyncPipeline::new(
        &destination,
        &reporter,
        settings(&["orders", "orders-replica"], 100),
    );

    let summary = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap();

    assert_eq!(source.fetches, vec![(0, 100), (100, 100), (200, 100), (250, 100)]);

    let calls = destination.bulk_calls();
    assert_eq!(calls.len(), 6);
    let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![100, 100, 100, 100, 50, 50]);
    // Each batch reaches every index before the next batch is read
    assert_eq!(calls[0][0].index, "orders");
    assert_eq!(calls[1][0].index, "orders-replica");

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.records_read, 250);
    assert_eq!(summary.documents_submitted, 500);
    assert_eq!(summary.documents_updated, 500);
    assert_eq!(destination.submitted_ids("orders").len(), 250);
}

#[tokio::test]
async fn test_fetch_count_is_batches_plus_one() {
    for (rows, batch) in [(1usize, 10usize), (10, 10), (11, 10), (95, 7), (3, 1)] {
        let destination = orders_index();
        let reporter = RecordingReporter::new();
        let mut source = FakeSource::orders(rows);
        let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], batch));

        pipeline
            .run_sql(&mut source, &fields(&["Status"]))
            .await
            .unwrap();

        assert_eq!(source.fetches.len(), rows.div_ceil(batch) + 1, "rows={rows} batch={batch}");
        assert_eq!(destination.submitted_ids("orders").len(), rows);
    }
}

#[tokio::test]
async fn test_item_failures_do_not_stop_the_run() {
    let destination = orders_index().rejecting(&["2", "4"]);
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(8);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 5));

    let summary = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.item_errors, 2);
    assert_eq!(summary.documents_updated, 6);
    assert_eq!(destination.bulk_calls().len(), 2);
    assert!(!summary.is_clean());

    let failed: Vec<String> = reporter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::ItemFailed { order_id, .. } => Some(order_id),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec!["2", "4"]);
}

#[tokio::test]
async fn test_transport_failure_aborts_after_applied_batches() {
    let destination = orders_index().failing_on_bulk_call(2);
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(500);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 100));

    let failure = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::BulkTransport { .. }));
    assert_eq!(failure.summary.state, RunState::Failed);
    assert_eq!(pipeline.state(), RunState::Failed);
    // Batch 1 stays applied; batches 3-5 are never read
    assert_eq!(failure.summary.batches, 1);
    assert_eq!(failure.summary.documents_updated, 100);
    assert_eq!(source.fetches, vec![(0, 100), (100, 100)]);
    assert_eq!(
        reporter.count(|e| matches!(e, SyncEvent::TransportFailed { .. })),
        1
    );
}

#[tokio::test]
async fn test_transport_failure_on_second_index_keeps_first_index_counts() {
    let destination = FakeDestination::new()
        .with_index("a", &["OrderId", "Status"])
        .with_index("b", &["OrderId", "Status"])
        .rejecting(&["7"])
        .failing_on_bulk_call(4);
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(20);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["a", "b"], 10));

    let failure = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::BulkTransport { ref index, .. } if index == "b"));
    // Batch 1 on both indexes plus batch 2 on `a`; order 7 rejected twice
    assert_eq!(failure.summary.batches, 1);
    assert_eq!(failure.summary.documents_submitted, 30);
    assert_eq!(failure.summary.documents_updated, 28);
    assert_eq!(failure.summary.item_errors, 2);
    assert_eq!(source.fetches, vec![(0, 10), (10, 10)]);
}

#[tokio::test]
async fn test_records_without_key_are_dropped_and_counted() {
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::new(vec![
        order(1),
        sql_row(&[("Status", json!("lost"))]),
        sql_row(&[("OrderId", json!(null)), ("Status", json!("lost"))]),
        sql_row(&[("OrderId", json!("  ")), ("Status", json!("lost"))]),
        order(5),
    ]);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 10));

    let summary = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap();

    assert_eq!(summary.records_read, 5);
    assert_eq!(summary.missing_keys, 3);
    assert_eq!(summary.documents_submitted, 2);
    assert_eq!(destination.submitted_ids("orders"), vec!["1", "5"]);
    assert!(!summary.is_clean());
}

#[tokio::test]
async fn test_unknown_update_fields_are_excluded() {
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(3);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 10));

    let summary = pipeline
        .run_sql(&mut source, &fields(&["status", "Colour"]))
        .await
        .unwrap();

    assert_eq!(summary.excluded_fields, vec!["Colour"]);
    assert_eq!(
        reporter.events().first(),
        Some(&SyncEvent::FieldExcluded {
            field: "Colour".to_string()
        })
    );
    for call in destination.bulk_calls() {
        for update in call {
            assert_eq!(update.doc.keys().collect::<Vec<_>>(), vec!["Status"]);
        }
    }
}

#[tokio::test]
async fn test_absent_fields_are_omitted_not_nulled() {
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::new(vec![
        sql_row(&[("OrderId", json!(1)), ("Status", json!("new"))]),
        sql_row(&[("OrderId", json!(2)), ("Status", json!("paid")), ("Total", json!(9.5))]),
    ]);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 10));

    let summary = pipeline
        .run_sql(&mut source, &fields(&["Status", "Total"]))
        .await
        .unwrap();

    let updates = &destination.bulk_calls()[0];
    assert!(!updates[0].doc.contains_key("Total"));
    assert_eq!(updates[1].doc.get("Total"), Some(&json!(9.5)));
    assert_eq!(summary.missing_fields, 1);
    // Missing fields alone do not make a run unclean
    assert!(summary.is_clean());
}

#[tokio::test]
async fn test_no_syncable_fields_fails_before_extraction() {
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(10);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 10));

    let failure = pipeline
        .run_sql(&mut source, &fields(&["Colour", "Size"]))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::NoSyncableFields { .. }));
    assert!(source.fetches.is_empty());
    assert!(destination.bulk_calls().is_empty());
}

#[tokio::test]
async fn test_missing_index_fails_discovery() {
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(10);
    let mut pipeline = SyncPipeline::new(
        &destination,
        &reporter,
        settings(&["orders", "archive"], 10),
    );

    let failure = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::SchemaUnavailable { ref index, .. } if index == "archive"));
    assert!(source.fetches.is_empty());
}

#[tokio::test]
async fn test_fields_must_exist_on_every_index() {
    let destination = FakeDestination::new()
        .with_index("orders", &["OrderId", "Status", "Total"])
        .with_index("orders-lite", &["OrderId", "Status"]);
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(2);
    let mut pipeline = SyncPipeline::new(
        &destination,
        &reporter,
        settings(&["orders", "orders-lite"], 10),
    );

    let summary = pipeline
        .run_sql(&mut source, &fields(&["Status", "Total"]))
        .await
        .unwrap();

    assert_eq!(summary.excluded_fields, vec!["Total"]);
}

#[tokio::test]
async fn test_source_error_is_fatal() {
    let destination = orders_index();
    let reporter = RecordingReporter::new();
    let mut source = FakeSource::orders(300).failing_at(200);
    let mut pipeline = SyncPipeline::new(&destination, &reporter, settings(&["orders"], 100));

    let failure = pipeline
        .run_sql(&mut source, &fields(&["Status"]))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, SyncError::SourceQuery(_)));
    assert_eq!(failure.summary.batches, 2);
    assert_eq!(destination.bulk_calls().len(), 2);
}
