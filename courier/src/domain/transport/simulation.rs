//! Offline stand-in for the vendor.
//!
//! Serves canned serviceability and locality data and mints `TPC` consignment
//! numbers from a random seed plus a process-wide counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use tracing::debug;

use super::{CourierTransport, run_detached};
use crate::domain::{
    ApiCallDraft, ApiName, AuditLogger, ConsignmentNote, ConsignmentQuantity, CourierError,
    LocalityMatch, LocalityQuery, Pincode, ServiceOptions, ServiceabilityReport,
};

/// `(pincode, city, state, deliverable, cod_available)`
const KNOWN_PINCODES: [(&str, &str, &str, bool, bool); 7] = [
    ("400001", "Mumbai", "Maharashtra", true, true),
    ("110001", "New Delhi", "Delhi", true, true),
    ("560001", "Bangalore", "Karnataka", true, true),
    ("600001", "Chennai", "Tamil Nadu", true, false),
    ("700001", "Kolkata", "West Bengal", true, true),
    ("411001", "Pune", "Maharashtra", true, true),
    ("999999", "Unknown", "Unknown", false, false),
];

const FALLBACK_CITY: &str = "Test City";
const FALLBACK_STATE: &str = "Test State";

/// `(area, city, state, pincode)`
const LOCALITIES: [(&str, &str, &str, &str); 6] = [
    ("Andheri East", "Mumbai", "Maharashtra", "400069"),
    ("Andheri West", "Mumbai", "Maharashtra", "400058"),
    ("Bandra East", "Mumbai", "Maharashtra", "400051"),
    ("Bandra West", "Mumbai", "Maharashtra", "400050"),
    ("Koramangala", "Bangalore", "Karnataka", "560034"),
    ("Indiranagar", "Bangalore", "Karnataka", "560038"),
];

const SEED_RANGE: std::ops::Range<u64> = 100_000_000..500_000_000;
/// Numbers wrap within nine digits.
const NUMBER_SPACE: u64 = 1_000_000_000;

struct SimulationInner {
    audit: AuditLogger,
    latency: Duration,
    next_number: AtomicU64,
}

/// Transport used when no live credential is active.
#[derive(Clone)]
pub struct SimulationTransport {
    inner: Arc<SimulationInner>,
}

impl SimulationTransport {
    /// Build a simulation with a random consignment seed and no latency.
    pub fn new(audit: AuditLogger) -> Self {
        Self::with_seed(audit, rand::thread_rng().gen_range(SEED_RANGE))
    }

    /// Build a simulation whose first consignment number is `seed`, wrapped to nine digits.
    pub fn with_seed(audit: AuditLogger, seed: u64) -> Self {
        Self {
            inner: Arc::new(SimulationInner {
                audit,
                latency: Duration::ZERO,
                next_number: AtomicU64::new(seed),
            }),
        }
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        let seed = self.inner.next_number.load(Ordering::SeqCst);
        Self {
            inner: Arc::new(SimulationInner {
                audit: self.inner.audit.clone(),
                latency,
                next_number: AtomicU64::new(seed),
            }),
        }
    }
}

#[async_trait]
impl CourierTransport for SimulationTransport {
    async fn check_serviceability(&self, pincode: &str) -> Result<ServiceabilityReport, CourierError> {
        let pincode = Pincode::parse(pincode)?;
        let inner = Arc::clone(&self.inner);
        run_detached(async move {
            inner.pause().await;
            let report = serviceability_for(pincode);
            let request = json!({ "pincode": report.pincode.as_str() }).to_string();
            let response = json!({ "success": true, "data": &report });
            inner.mirror(ApiName::PincodeCheck, request, &response).await;
            Ok(report)
        })
        .await
    }

    async fn search_locality(&self, query: &str) -> Result<Vec<LocalityMatch>, CourierError> {
        let query = LocalityQuery::parse(query)?;
        let inner = Arc::clone(&self.inner);
        run_detached(async move {
            inner.pause().await;
            let matches = localities_matching(&query)?;
            let request = json!({ "areaName": query.as_str() }).to_string();
            let response = json!({ "success": true, "data": &matches });
            inner.mirror(ApiName::LocalitySearch, request, &response).await;
            Ok(matches)
        })
        .await
    }

    async fn request_consignment_notes(&self, quantity: u32) -> Result<Vec<ConsignmentNote>, CourierError> {
        let quantity = ConsignmentQuantity::new(quantity)?;
        let inner = Arc::clone(&self.inner);
        run_detached(async move {
            inner.pause().await;
            let numbers = inner.mint(quantity)?;
            let request = json!({ "client": "SIMULATION", "quantity": quantity.get() }).to_string();
            let response = json!({ "STATUS": "SUCCESS", "CN_NUMBERS": &numbers });
            inner.mirror(ApiName::ConsignmentRequest, request, &response).await;
            Ok(numbers)
        })
        .await
    }
}

impl SimulationInner {
    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn mirror(&self, api_name: ApiName, request: String, response: &serde_json::Value) {
        debug!(api_name = api_name.as_str(), "simulated courier call");
        self.audit
            .record(ApiCallDraft::success(api_name, request, response.to_string(), 1))
            .await;
    }

    fn mint(&self, quantity: ConsignmentQuantity) -> Result<Vec<ConsignmentNote>, CourierError> {
        let count = u64::from(quantity.get());
        let first = self.next_number.fetch_add(count, Ordering::SeqCst);
        (first..first.saturating_add(count))
            .map(|number| {
                ConsignmentNote::new(format!("TPC{:09}", number % NUMBER_SPACE))
                    .ok_or_else(|| CourierError::internal("simulated consignment number was blank"))
            })
            .collect()
    }
}

fn serviceability_for(pincode: Pincode) -> ServiceabilityReport {
    let (city, state, deliverable, cod_available) = KNOWN_PINCODES
        .iter()
        .find(|(known, ..)| *known == pincode.as_str())
        .map_or(
            (FALLBACK_CITY, FALLBACK_STATE, true, true),
            |&(_, city, state, deliverable, cod)| (city, state, deliverable, cod),
        );
    ServiceabilityReport {
        pincode,
        deliverable,
        cod_available,
        city: city.to_owned(),
        state: state.to_owned(),
        options: ServiceOptions {
            document_delivery: deliverable,
            ..ServiceOptions::default()
        },
    }
}

fn localities_matching(query: &LocalityQuery) -> Result<Vec<LocalityMatch>, CourierError> {
    LOCALITIES
        .iter()
        .filter(|(area, city, _, _)| query.matches(area, city))
        .map(|&(area, city, state, pincode)| {
            Ok(LocalityMatch {
                area: area.to_owned(),
                city: city.to_owned(),
                state: state.to_owned(),
                pincode: Pincode::parse(pincode)?,
            })
        })
        .collect()
}
