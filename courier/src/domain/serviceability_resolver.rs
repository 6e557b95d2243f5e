//! Pincode serviceability with a TTL cache and single-flight misses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tracing::{debug, instrument};

use super::single_flight::SingleFlight;
use super::transport::{CourierTransport, TransportSelector};
use super::{CourierError, Pincode, PincodeServiceability};

/// Default freshness window for cached verdicts.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

type Cache = Arc<Mutex<HashMap<Pincode, PincodeServiceability>>>;

/// Checkout-facing serviceability lookups.
pub struct ServiceabilityResolver {
    selector: Arc<dyn TransportSelector>,
    clock: Arc<dyn Clock + Send + Sync>,
    ttl: TimeDelta,
    cache: Cache,
    flights: SingleFlight<Pincode, PincodeServiceability, CourierError>,
}

impl ServiceabilityResolver {
    /// Build a resolver that caches verdicts for `ttl`.
    ///
    /// A TTL too large for the calendar is clamped to one day.
    pub fn new(
        selector: Arc<dyn TransportSelector>,
        clock: Arc<dyn Clock + Send + Sync>,
        ttl: Duration,
    ) -> Self {
        Self {
            selector,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::days(1)),
            cache: Arc::new(Mutex::new(HashMap::new())),
            flights: SingleFlight::default(),
        }
    }

    /// Serviceability of `pincode`, from cache while fresh.
    #[instrument(skip(self))]
    pub async fn resolve(&self, pincode: &str) -> Result<PincodeServiceability, CourierError> {
        let pincode = Pincode::parse(pincode)?;
        if let Some(hit) = fresh_entry(&self.cache, &pincode, self.clock.utc()) {
            debug!(pincode = %pincode, "serviceability cache hit");
            return Ok(hit);
        }

        let selector = Arc::clone(&self.selector);
        let clock = Arc::clone(&self.clock);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let key = pincode.clone();
        self.flights
            .run(pincode, move || async move {
                if let Some(hit) = fresh_entry(&cache, &key, clock.utc()) {
                    return Ok(hit);
                }
                debug!(pincode = %key, "serviceability cache miss");
                let transport = selector.current_transport().await?;
                let report = transport.check_serviceability(key.as_str()).await?;
                let now = clock.utc();
                let entry = PincodeServiceability::from_report(report, now, ttl);
                store(&cache, key, entry.clone(), now);
                Ok(entry)
            })
            .await
    }

    /// Drop the cached verdict for `pincode`; returns whether one existed.
    pub fn invalidate(&self, pincode: &Pincode) -> bool {
        lock(&self.cache).remove(pincode).is_some()
    }

    /// Drop every expired verdict; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.utc();
        let mut cache = lock(&self.cache);
        let before = cache.len();
        cache.retain(|_, entry| entry.is_fresh(now));
        before - cache.len()
    }

    /// Number of cached verdicts, fresh or not.
    pub fn cached_len(&self) -> usize {
        lock(&self.cache).len()
    }
}

fn fresh_entry(cache: &Cache, pincode: &Pincode, now: DateTime<Utc>) -> Option<PincodeServiceability> {
    lock(cache)
        .get(pincode)
        .filter(|entry| entry.is_fresh(now))
        .cloned()
}

/// Insert `entry`, evicting verdicts that have already expired.
fn store(cache: &Cache, pincode: Pincode, entry: PincodeServiceability, now: DateTime<Utc>) {
    let mut cache = lock(cache);
    cache.retain(|_, cached| cached.is_fresh(now));
    cache.insert(pincode, entry);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::transport::{ActiveTransport, MockTransportSelector, SimulationTransport};
    use crate::domain::ports::FixtureAuditLogRepository;
    use crate::domain::AuditLogger;
    use crate::test_support::MutableClock;

    fn simulation_selector(selections: Arc<AtomicUsize>, clock: &MutableClock) -> MockTransportSelector {
        let audit = AuditLogger::new(Arc::new(FixtureAuditLogRepository), clock.shared());
        let simulation = SimulationTransport::new(audit);
        let mut selector = MockTransportSelector::new();
        selector.expect_current_transport().returning(move || {
            selections.fetch_add(1, Ordering::SeqCst);
            Ok(ActiveTransport::Simulation(simulation.clone()))
        });
        selector
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let clock = MutableClock::default();
        let selections = Arc::new(AtomicUsize::new(0));
        let resolver = ServiceabilityResolver::new(
            Arc::new(simulation_selector(Arc::clone(&selections), &clock)),
            clock.shared(),
            DEFAULT_CACHE_TTL,
        );

        let first = resolver.resolve("400001").await.expect("first");
        clock.advance(TimeDelta::seconds(299));
        let second = resolver.resolve("400001").await.expect("second");

        assert_eq!(first, second);
        assert_eq!(selections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed_and_purged() {
        let clock = MutableClock::default();
        let selections = Arc::new(AtomicUsize::new(0));
        let resolver = ServiceabilityResolver::new(
            Arc::new(simulation_selector(Arc::clone(&selections), &clock)),
            clock.shared(),
            DEFAULT_CACHE_TTL,
        );

        resolver.resolve("110001").await.expect("first");
        resolver.resolve("560001").await.expect("second");
        clock.advance(TimeDelta::seconds(300));
        assert_eq!(resolver.purge_expired(), 2);

        resolver.resolve("110001").await.expect("refresh");
        assert_eq!(selections.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.cached_len(), 1);
    }

    #[tokio::test]
    async fn inserting_a_verdict_evicts_expired_ones() {
        let clock = MutableClock::default();
        let selections = Arc::new(AtomicUsize::new(0));
        let resolver = ServiceabilityResolver::new(
            Arc::new(simulation_selector(Arc::clone(&selections), &clock)),
            clock.shared(),
            DEFAULT_CACHE_TTL,
        );

        resolver.resolve("110001").await.expect("first");
        resolver.resolve("560001").await.expect("second");
        clock.advance(TimeDelta::seconds(300));
        resolver.resolve("600001").await.expect("third");

        assert_eq!(resolver.cached_len(), 1);
    }

    #[tokio::test]
    async fn malformed_pincodes_fail_before_selection() {
        let clock = MutableClock::default();
        let mut selector = MockTransportSelector::new();
        selector.expect_current_transport().never();
        let resolver = ServiceabilityResolver::new(Arc::new(selector), clock.shared(), DEFAULT_CACHE_TTL);

        let err = resolver.resolve("4000O1").await.expect_err("validation");
        assert!(matches!(err, CourierError::Validation { .. }));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let clock = MutableClock::default();
        let mut selector = MockTransportSelector::new();
        selector
            .expect_current_transport()
            .times(2)
            .returning(|| Err(CourierError::config("no active credential")));
        let resolver = ServiceabilityResolver::new(Arc::new(selector), clock.shared(), DEFAULT_CACHE_TTL);

        assert!(resolver.resolve("400001").await.is_err());
        assert!(resolver.resolve("400001").await.is_err());
        assert_eq!(resolver.cached_len(), 0);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_lookup() {
        let clock = MutableClock::default();
        let selections = Arc::new(AtomicUsize::new(0));
        let resolver = ServiceabilityResolver::new(
            Arc::new(simulation_selector(Arc::clone(&selections), &clock)),
            clock.shared(),
            DEFAULT_CACHE_TTL,
        );

        resolver.resolve("700001").await.expect("first");
        assert!(resolver.invalidate(&Pincode::parse("700001").expect("pincode")));
        resolver.resolve("700001").await.expect("second");
        assert_eq!(selections.load(Ordering::SeqCst), 2);
    }
}
