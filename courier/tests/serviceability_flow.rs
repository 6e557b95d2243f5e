//! End-to-end serviceability and locality lookups over the in-memory stack.
//!
//! Live calls go to a [`ScriptedGateway`]; retry sleeps are recorded rather
//! than awaited so backoff schedules can be asserted directly.

use std::sync::Arc;
use std::time::Duration;

use courier::domain::ports::VendorGatewayError;
use courier::domain::transport::{CourierTransport, TransportMode, TransportSelector};
use courier::domain::{
    ApiName, AuditFilter, CallStatus, CourierError, LocalityMatch, Pincode, SelectionPolicy,
    ServiceOptions, ServiceabilityReport,
};
use courier::test_support::{CourierHarness, ScriptedGateway};
use futures_util::future::join_all;
use rstest::{fixture, rstest};

#[fixture]
fn harness() -> CourierHarness {
    CourierHarness::default()
}

fn pincode_records() -> AuditFilter {
    AuditFilter {
        api_name: Some(ApiName::PincodeCheck),
        ..AuditFilter::default()
    }
}

fn report(code: &str, city: &str, deliverable: bool) -> ServiceabilityReport {
    ServiceabilityReport {
        pincode: Pincode::parse(code).expect("valid pincode"),
        deliverable,
        cod_available: deliverable,
        city: city.to_owned(),
        state: "Karnataka".to_owned(),
        options: ServiceOptions::default(),
    }
}

#[rstest]
#[case("400001", "Mumbai", true, true)]
#[case("999999", "Unknown", false, false)]
#[tokio::test]
async fn simulated_pincodes_resolve_without_a_login(
    harness: CourierHarness,
    #[case] code: &str,
    #[case] city: &str,
    #[case] deliverable: bool,
    #[case] cod: bool,
) {
    let resolved = harness.services.resolver.resolve(code).await.expect("resolved");

    assert_eq!(resolved.city, city);
    assert_eq!(resolved.deliverable, deliverable);
    assert_eq!(resolved.cod_available, cod);
    assert_eq!(harness.gateway.total_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn simulated_locality_search_finds_both_andheri_areas(harness: CourierHarness) {
    let transport = harness
        .services
        .credentials
        .current_transport()
        .await
        .expect("transport");
    assert_eq!(transport.mode(), TransportMode::Simulation);

    let matches = transport.search_locality("andheri").await.expect("matches");
    let areas: Vec<&str> = matches.iter().map(|m| m.area.as_str()).collect();
    assert_eq!(areas, ["Andheri East", "Andheri West"]);
}

#[rstest]
#[tokio::test]
async fn concurrent_lookups_share_one_vendor_call() {
    let harness = CourierHarness::new(
        ScriptedGateway::gated(),
        SelectionPolicy::FallbackToSimulation,
    );
    harness.activate_login().await;
    let resolver = Arc::clone(&harness.services.resolver);

    let lookups = join_all((0..8).map(|_| resolver.resolve("560001")));
    let release = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.gateway.release();
    };
    let (results, ()) = tokio::join!(lookups, release);

    assert_eq!(harness.gateway.pincode_calls(), 1);
    for result in results {
        assert_eq!(result.expect("resolved").city, "Scripted City");
    }
    let audited = harness
        .services
        .audit
        .filter(&pincode_records())
        .await
        .expect("audit");
    assert_eq!(audited.len(), 1);
}

#[rstest]
#[tokio::test]
async fn cached_verdicts_expire_after_the_ttl(harness: CourierHarness) {
    harness.activate_login().await;
    harness.gateway.push_pincode(Ok(report("560001", "Bengaluru", true)));
    harness.gateway.push_pincode(Ok(report("560001", "Bengaluru", false)));
    let resolver = &harness.services.resolver;

    let first = resolver.resolve("560001").await.expect("first");
    harness.clock.advance_seconds(60);
    let cached = resolver.resolve("560001").await.expect("cached");
    assert_eq!(first, cached);
    assert_eq!(harness.gateway.pincode_calls(), 1);

    harness.clock.advance_seconds(300);
    let refreshed = resolver.resolve("560001").await.expect("refreshed");
    assert!(!refreshed.deliverable);
    assert_eq!(harness.gateway.pincode_calls(), 2);
}

#[rstest]
#[tokio::test]
async fn persistent_timeouts_exhaust_the_retry_budget(harness: CourierHarness) {
    harness.activate_login().await;
    harness
        .gateway
        .fail_pincode(3, &VendorGatewayError::timeout("deadline elapsed"));

    let err = harness
        .services
        .resolver
        .resolve("110001")
        .await
        .expect_err("timeouts should surface");

    assert!(matches!(err, CourierError::Transport { attempts: 3, .. }));
    assert_eq!(harness.gateway.pincode_calls(), 3);
    assert_eq!(
        harness.sleeper.delays(),
        [Duration::from_millis(200), Duration::from_millis(400)]
    );
    let audited = harness
        .services
        .audit
        .filter(&pincode_records())
        .await
        .expect("audit");
    assert_eq!(audited.len(), 1);
    let record = audited.first().expect("one record");
    assert_eq!(record.status, CallStatus::Failed);
    assert_eq!(record.attempts, 3);
}

#[rstest]
#[tokio::test]
async fn a_transient_failure_is_retried_and_recorded_once(harness: CourierHarness) {
    harness.activate_login().await;
    harness
        .gateway
        .fail_pincode(1, &VendorGatewayError::rate_limited("HTTP 429"));

    let resolved = harness
        .services
        .resolver
        .resolve("110001")
        .await
        .expect("second attempt succeeds");

    assert_eq!(resolved.city, "Scripted City");
    assert_eq!(harness.sleeper.delays(), [Duration::from_millis(200)]);
    let audited = harness
        .services
        .audit
        .filter(&pincode_records())
        .await
        .expect("audit");
    let record = audited.first().expect("one record");
    assert_eq!(audited.len(), 1);
    assert_eq!(record.status, CallStatus::Success);
    assert_eq!(record.attempts, 2);
}

#[rstest]
#[tokio::test]
async fn vendor_rejections_are_not_retried(harness: CourierHarness) {
    harness.activate_login().await;
    harness.gateway.push_pincode(Err(VendorGatewayError::rejected(
        "invalid pincode",
        r#"{"error":"invalid pincode"}"#,
    )));

    let err = harness
        .services
        .resolver
        .resolve("110001")
        .await
        .expect_err("rejected");

    assert_eq!(err.raw_response(), Some(r#"{"error":"invalid pincode"}"#));
    assert_eq!(harness.gateway.pincode_calls(), 1);
    assert!(harness.sleeper.delays().is_empty());
    let audited = harness
        .services
        .audit
        .filter(&pincode_records())
        .await
        .expect("audit");
    assert_eq!(audited.len(), 1);
    let record = audited.first().expect("one record");
    assert_eq!(record.status, CallStatus::Failed);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.response_payload, r#"{"error":"invalid pincode"}"#);
}

async fn wait_for_pincode_records(harness: &CourierHarness, expected: usize) -> usize {
    for _ in 0..200 {
        let found = harness
            .services
            .audit
            .filter(&pincode_records())
            .await
            .expect("audit")
            .len();
        if found >= expected {
            return found;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    0
}

#[rstest]
#[tokio::test]
async fn an_abandoned_lookup_still_completes_and_is_audited() {
    let harness = CourierHarness::new(
        ScriptedGateway::gated(),
        SelectionPolicy::FallbackToSimulation,
    );
    harness.activate_login().await;
    let resolver = Arc::clone(&harness.services.resolver);

    let caller = tokio::spawn(async move { resolver.resolve("560001").await });
    while harness.gateway.pincode_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    caller.abort();
    assert!(caller.await.is_err_and(|err| err.is_cancelled()));
    harness.gateway.release();

    assert_eq!(wait_for_pincode_records(&harness, 1).await, 1);
    let resolved = harness
        .services
        .resolver
        .resolve("560001")
        .await
        .expect("completed verdict");
    assert_eq!(resolved.city, "Scripted City");
    assert_eq!(harness.gateway.pincode_calls(), 1);
}

#[rstest]
#[case("40001")]
#[case("40000a")]
#[case("")]
#[tokio::test]
async fn malformed_pincodes_never_reach_the_vendor(harness: CourierHarness, #[case] code: &str) {
    harness.activate_login().await;

    let err = harness
        .services
        .resolver
        .resolve(code)
        .await
        .expect_err("invalid");

    assert!(matches!(err, CourierError::Validation { .. }));
    assert_eq!(harness.gateway.total_calls(), 0);
    let audited = harness
        .services
        .audit
        .filter(&pincode_records())
        .await
        .expect("audit");
    assert!(audited.is_empty());
}

#[rstest]
#[tokio::test]
async fn live_locality_results_are_filtered_to_the_query(harness: CourierHarness) {
    harness.activate_login().await;
    let found = |area: &str, code: &str| LocalityMatch {
        area: area.to_owned(),
        city: "Mumbai".to_owned(),
        state: "Maharashtra".to_owned(),
        pincode: Pincode::parse(code).expect("valid pincode"),
    };
    harness.gateway.push_locality(Ok(vec![
        found("Andheri East", "400069"),
        found("Bandra West", "400050"),
    ]));

    let transport = harness
        .services
        .credentials
        .current_transport()
        .await
        .expect("transport");
    assert_eq!(transport.mode(), TransportMode::Live);
    let matches = transport.search_locality("andheri").await.expect("matches");

    assert_eq!(matches.len(), 1);
    assert_eq!(harness.gateway.locality_calls(), 1);
}
