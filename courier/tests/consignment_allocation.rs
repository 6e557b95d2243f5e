//! Consignment-note allocation across the allocator, transports, and stores.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use courier::domain::ports::{NotificationKind, VendorGatewayError};
use courier::domain::transport::{CourierTransport, TransportSelector};
use courier::domain::{
    AllocationError, ApiName, AuditFilter, BatchStatus, ConsignmentNote, CourierError,
    SelectionPolicy,
};
use courier::test_support::{CourierHarness, ScriptedGateway};
use futures_util::future::join_all;
use rstest::{fixture, rstest};

#[fixture]
fn harness() -> CourierHarness {
    CourierHarness::default()
}

fn numbers(batch: &courier::domain::ConsignmentBatch) -> Vec<&str> {
    batch.numbers().iter().map(ConsignmentNote::as_str).collect()
}

#[rstest]
#[tokio::test]
async fn simulated_requests_return_distinct_numbers(harness: CourierHarness) {
    let transport = harness
        .services
        .credentials
        .current_transport()
        .await
        .expect("transport");

    let notes = transport.request_consignment_notes(3).await.expect("notes");

    let unique: HashSet<&str> = notes.iter().map(ConsignmentNote::as_str).collect();
    assert_eq!(unique.len(), 3);
    assert!(notes.iter().all(|note| note.as_str().starts_with("TPC")));
    let audited = harness
        .services
        .audit
        .filter(&AuditFilter {
            api_name: Some(ApiName::ConsignmentRequest),
            ..AuditFilter::default()
        })
        .await
        .expect("audit");
    assert_eq!(audited.len(), 1);
}

#[rstest]
#[tokio::test]
async fn repeated_allocation_returns_the_stored_batch(harness: CourierHarness) {
    harness.activate_login().await;
    let allocator = &harness.services.allocator;

    let first = allocator.allocate("ORD-1001", 2).await.expect("first");
    let second = allocator.allocate("ORD-1001", 2).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(first.status(), BatchStatus::Allocated);
    assert_eq!(numbers(&first), ["LIVE00000000", "LIVE00000001"]);
    assert_eq!(harness.gateway.consignment_calls(), 1);
}

#[rstest]
#[tokio::test]
async fn concurrent_allocations_for_one_order_share_a_request() {
    let harness = CourierHarness::new(
        ScriptedGateway::gated(),
        SelectionPolicy::FallbackToSimulation,
    );
    harness.activate_login().await;
    let allocator = Arc::clone(&harness.services.allocator);

    let requests = join_all((0..6).map(|_| allocator.allocate("ORD-2002", 1)));
    let release = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.gateway.release();
    };
    let (results, ()) = tokio::join!(requests, release);

    let batches: Vec<_> = results
        .into_iter()
        .map(|result| result.expect("allocated"))
        .collect();
    let first = batches.first().expect("at least one batch");
    assert!(batches.iter().all(|batch| batch == first));
    assert_eq!(harness.gateway.consignment_calls(), 1);
}

#[rstest]
#[tokio::test]
async fn different_orders_receive_different_numbers(harness: CourierHarness) {
    harness.activate_login().await;
    let allocator = &harness.services.allocator;

    let a = allocator.allocate("ORD-A", 2).await.expect("a");
    let b = allocator.allocate("ORD-B", 2).await.expect("b");

    let seen: HashSet<&str> = numbers(&a).into_iter().chain(numbers(&b)).collect();
    assert_eq!(seen.len(), 4);
    assert_eq!(harness.gateway.consignment_calls(), 2);
}

#[rstest]
#[tokio::test]
async fn stock_shortage_fails_the_batch_and_alerts_admins(harness: CourierHarness) {
    harness.activate_login().await;
    harness.gateway.push_consignment(Err(VendorGatewayError::rejected(
        "consignment note stock not available",
        r#"{"STATUS":"FAILED"}"#,
    )));
    let allocator = &harness.services.allocator;

    let err = allocator
        .allocate("ORD-3003", 1)
        .await
        .expect_err("vendor refused");
    assert!(matches!(
        err,
        AllocationError::Courier(CourierError::Vendor { .. })
    ));

    let stored = allocator
        .batch("ORD-3003")
        .await
        .expect("lookup")
        .expect("batch kept");
    assert_eq!(stored.status(), BatchStatus::Failed);
    assert!(stored.failure_reason().is_some());

    let alerts: Vec<_> = harness
        .notifier
        .delivered()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::ConsignmentStockUnavailable)
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts.first().and_then(|n| n.order_id.as_ref()).map(|id| id.as_str()),
        Some("ORD-3003")
    );
}

#[rstest]
#[tokio::test]
async fn a_failed_batch_is_retried_on_the_next_request(harness: CourierHarness) {
    harness.activate_login().await;
    harness
        .gateway
        .push_consignment(Err(VendorGatewayError::decode("bad body", "<html>")));
    let allocator = &harness.services.allocator;

    allocator
        .allocate("ORD-4004", 1)
        .await
        .expect_err("first attempt fails");
    let retried = allocator.allocate("ORD-4004", 1).await.expect("retry");

    assert_eq!(retried.status(), BatchStatus::Allocated);
    assert_eq!(retried.numbers().len(), 1);
    assert_eq!(harness.gateway.consignment_calls(), 2);
    let failures: Vec<_> = harness
        .notifier
        .delivered()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::ConsignmentStockUnavailable)
        .collect();
    assert_eq!(failures.len(), 1);
}

#[rstest]
#[tokio::test]
async fn transport_exhaustion_raises_an_allocation_alert(harness: CourierHarness) {
    harness.activate_login().await;
    for _ in 0..3 {
        harness
            .gateway
            .push_consignment(Err(VendorGatewayError::transport("connection reset")));
    }

    let err = harness
        .services
        .allocator
        .allocate("ORD-5005", 1)
        .await
        .expect_err("network down");

    assert!(matches!(
        err,
        AllocationError::Courier(CourierError::Transport { attempts: 3, .. })
    ));
    assert!(harness
        .notifier
        .delivered()
        .iter()
        .any(|n| n.kind == NotificationKind::ConsignmentAllocationFailed));
}

#[rstest]
#[case("", 1)]
#[case("ORD-1", 0)]
#[case("ORD-1", u32::MAX)]
#[tokio::test]
async fn invalid_requests_are_rejected_before_any_call(
    harness: CourierHarness,
    #[case] order: &str,
    #[case] quantity: u32,
) {
    harness.activate_login().await;

    let err = harness
        .services
        .allocator
        .allocate(order, quantity)
        .await
        .expect_err("invalid");

    assert!(matches!(
        err,
        AllocationError::Courier(CourierError::Validation { .. })
    ));
    assert_eq!(harness.gateway.total_calls(), 0);
    assert!(harness
        .notifier
        .delivered()
        .iter()
        .all(|n| n.kind == NotificationKind::IntegrationSetup));
}

#[rstest]
#[tokio::test]
async fn an_abandoned_allocation_still_settles_the_batch() {
    let harness = CourierHarness::new(
        ScriptedGateway::gated(),
        SelectionPolicy::FallbackToSimulation,
    );
    harness.activate_login().await;
    let allocator = Arc::clone(&harness.services.allocator);

    let caller = tokio::spawn(async move { allocator.allocate("ORD-6006", 2).await });
    while harness.gateway.consignment_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    caller.abort();
    assert!(caller.await.is_err_and(|err| err.is_cancelled()));
    harness.gateway.release();

    let mut settled = None;
    for _ in 0..200 {
        let batch = harness
            .services
            .allocator
            .batch("ORD-6006")
            .await
            .expect("lookup");
        if batch.as_ref().is_some_and(|b| b.status() == BatchStatus::Allocated) {
            settled = batch;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let settled = settled.expect("batch allocated after the caller left");
    assert_eq!(numbers(&settled), ["LIVE00000000", "LIVE00000001"]);
    assert_eq!(harness.gateway.consignment_calls(), 1);
}
