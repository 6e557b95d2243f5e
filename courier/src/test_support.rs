//! Test utilities for the courier crate.
//!
//! Shared by unit tests in `src/` and integration tests in `tests/`. Compiled
//! for tests and behind the `test-support` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use url::Url;
use zeroize::Zeroizing;

use crate::bootstrap::{CourierAdapters, CourierServices};
use crate::domain::ports::{VendorAccess, VendorExchange, VendorGateway, VendorGatewayError};
use crate::domain::{
    AuditLogger, BackoffJitter, ConsignmentNote, ConsignmentQuantity, CourierCredential,
    CredentialDraft, DEFAULT_CACHE_TTL, LocalityMatch, LocalityQuery, Pincode, Provider,
    RetryPolicy, RetryRuntime, RetrySleeper, SelectionPolicy, ServiceOptions,
    ServiceabilityReport, TransportOptions,
};
use crate::outbound::memory::{
    InMemoryAuditLog, InMemoryConsignmentBatches, InMemoryCredentials, RecordingAdminNotifier,
};
use crate::outbound::{AesGcmSecretCipher, JsonlAuditLog};

/// Password used by [`CourierHarness::activate_login`].
pub const HARNESS_PASSWORD: &str = "s3cret-tpc-password";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct MutableClock(Arc<Mutex<DateTime<Utc>>>);

impl Default for MutableClock {
    fn default() -> Self {
        Self::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        )
    }
}

impl MutableClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    /// Shared handle for services; advancing `self` moves it too.
    pub fn shared(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::new(self.clone())
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        *lock(&self.0) += delta;
    }

    /// Move time forward by whole seconds.
    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(TimeDelta::seconds(seconds));
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Sleeper that returns at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateSleeper;

#[async_trait]
impl RetrySleeper for ImmediateSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sleeper that records requested delays and returns at once.
#[derive(Debug, Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    /// Delays requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.0).clone()
    }
}

#[async_trait]
impl RetrySleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.0).push(duration);
    }
}

/// Jitter that returns the base delay unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl BackoffJitter for NoJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32, _now: DateTime<Utc>) -> Duration {
        base
    }
}

/// Cipher with a fixed all-`0x2a` key.
///
/// # Panics
///
/// Never in practice; the key length is fixed.
pub fn fixed_cipher() -> AesGcmSecretCipher {
    match AesGcmSecretCipher::from_key_bytes(&[0x2a; 32]) {
        Ok(cipher) => cipher,
        Err(error) => panic!("fixed test key rejected: {error}"),
    }
}

/// JSON-lines audit log in a fresh temporary directory.
///
/// Keep the returned directory alive for as long as the log is used.
///
/// # Panics
///
/// Panics when the temporary directory cannot be created.
pub fn temp_audit_log() -> (TempDir, JsonlAuditLog) {
    let dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(error) => panic!("temp dir: {error}"),
    };
    match JsonlAuditLog::open(dir.path().join("audit.jsonl")) {
        Ok(log) => (dir, log),
        Err(error) => panic!("open audit log: {error}"),
    }
}

fn exchange<T: Serialize>(value: T) -> VendorExchange<T> {
    let raw_response = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_owned());
    VendorExchange {
        value,
        raw_response,
    }
}

type Script<T> = Mutex<VecDeque<Result<T, VendorGatewayError>>>;

/// Vendor gateway replaying queued outcomes per endpoint.
///
/// Once an endpoint's queue is empty it answers with a default: a deliverable
/// "Scripted City" report, no localities, or fresh `LIVE` numbers. A gated
/// gateway holds every call until [`ScriptedGateway::release`] is called.
#[derive(Default)]
pub struct ScriptedGateway {
    pincode: Script<ServiceabilityReport>,
    locality: Script<Vec<LocalityMatch>>,
    consignment: Script<Vec<ConsignmentNote>>,
    pincode_calls: AtomicUsize,
    locality_calls: AtomicUsize,
    consignment_calls: AtomicUsize,
    next_number: AtomicU64,
    passwords: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl ScriptedGateway {
    /// Gateway answering with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose calls block until released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Let held and future calls proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Queue a pincode outcome.
    pub fn push_pincode(&self, outcome: Result<ServiceabilityReport, VendorGatewayError>) {
        lock(&self.pincode).push_back(outcome);
    }

    /// Queue a locality outcome.
    pub fn push_locality(&self, outcome: Result<Vec<LocalityMatch>, VendorGatewayError>) {
        lock(&self.locality).push_back(outcome);
    }

    /// Queue a consignment outcome.
    pub fn push_consignment(&self, outcome: Result<Vec<ConsignmentNote>, VendorGatewayError>) {
        lock(&self.consignment).push_back(outcome);
    }

    /// Queue `times` copies of a pincode failure.
    pub fn fail_pincode(&self, times: usize, error: &VendorGatewayError) {
        for _ in 0..times {
            self.push_pincode(Err(error.clone()));
        }
    }

    /// Pincode calls received.
    pub fn pincode_calls(&self) -> usize {
        self.pincode_calls.load(Ordering::SeqCst)
    }

    /// Locality calls received.
    pub fn locality_calls(&self) -> usize {
        self.locality_calls.load(Ordering::SeqCst)
    }

    /// Consignment calls received.
    pub fn consignment_calls(&self) -> usize {
        self.consignment_calls.load(Ordering::SeqCst)
    }

    /// Calls received on every endpoint.
    pub fn total_calls(&self) -> usize {
        self.pincode_calls() + self.locality_calls() + self.consignment_calls()
    }

    /// Passwords presented, one per call.
    pub fn passwords_seen(&self) -> Vec<String> {
        lock(&self.passwords).clone()
    }

    async fn enter(&self, access: &VendorAccess, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        lock(&self.passwords).push(access.password.as_str().to_owned());
        if let Some(gate) = &self.gate {
            // The permit goes straight back so every waiter passes.
            drop(gate.acquire().await);
        }
    }
}

#[async_trait]
impl VendorGateway for ScriptedGateway {
    async fn pincode_service(
        &self,
        access: &VendorAccess,
        pincode: &Pincode,
    ) -> Result<VendorExchange<ServiceabilityReport>, VendorGatewayError> {
        self.enter(access, &self.pincode_calls).await;
        let scripted = lock(&self.pincode).pop_front();
        scripted
            .unwrap_or_else(|| {
                Ok(ServiceabilityReport {
                    pincode: pincode.clone(),
                    deliverable: true,
                    cod_available: true,
                    city: "Scripted City".to_owned(),
                    state: "Scripted State".to_owned(),
                    options: ServiceOptions::default(),
                })
            })
            .map(exchange)
    }

    async fn locality_search(
        &self,
        access: &VendorAccess,
        _query: &LocalityQuery,
    ) -> Result<VendorExchange<Vec<LocalityMatch>>, VendorGatewayError> {
        self.enter(access, &self.locality_calls).await;
        let scripted = lock(&self.locality).pop_front();
        scripted.unwrap_or_else(|| Ok(Vec::new())).map(exchange)
    }

    async fn consignment_notes(
        &self,
        access: &VendorAccess,
        quantity: ConsignmentQuantity,
    ) -> Result<VendorExchange<Vec<ConsignmentNote>>, VendorGatewayError> {
        self.enter(access, &self.consignment_calls).await;
        let scripted = lock(&self.consignment).pop_front();
        scripted
            .unwrap_or_else(|| {
                let count = u64::from(quantity.get());
                let first = self.next_number.fetch_add(count, Ordering::SeqCst);
                Ok((first..first + count)
                    .filter_map(|n| ConsignmentNote::new(format!("LIVE{n:08}")))
                    .collect())
            })
            .map(exchange)
    }
}

/// Full in-memory service stack over a [`ScriptedGateway`].
pub struct CourierHarness {
    /// Wired services.
    pub services: CourierServices,
    /// Vendor stand-in.
    pub gateway: Arc<ScriptedGateway>,
    /// Clock shared by every service.
    pub clock: MutableClock,
    /// Notifications raised.
    pub notifier: Arc<RecordingAdminNotifier>,
    /// Batch storage.
    pub batches: Arc<InMemoryConsignmentBatches>,
    /// Retry delays requested by the live transport.
    pub sleeper: Arc<RecordingSleeper>,
}

impl Default for CourierHarness {
    fn default() -> Self {
        Self::new(ScriptedGateway::new(), SelectionPolicy::FallbackToSimulation)
    }
}

impl CourierHarness {
    /// Build the stack over `gateway` with `policy`.
    pub fn new(gateway: ScriptedGateway, policy: SelectionPolicy) -> Self {
        let clock = MutableClock::default();
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(RecordingAdminNotifier::new());
        let batches = Arc::new(InMemoryConsignmentBatches::new());
        let sleeper = Arc::new(RecordingSleeper::default());
        let audit = AuditLogger::new(Arc::new(InMemoryAuditLog::new()), clock.shared());
        let options = TransportOptions {
            retry: RetryPolicy::default(),
            runtime: RetryRuntime {
                sleeper: Arc::clone(&sleeper) as _,
                jitter: Arc::new(NoJitter),
            },
            policy,
            simulation: None,
        };
        let adapters = CourierAdapters {
            credentials: Arc::new(InMemoryCredentials::new()),
            cipher: Arc::new(fixed_cipher()),
            gateway: Arc::clone(&gateway) as _,
            batches: Arc::clone(&batches) as _,
            notifier: Arc::clone(&notifier) as _,
        };
        let services = CourierServices::wire(
            Provider::tpc(),
            adapters,
            audit,
            options,
            DEFAULT_CACHE_TTL,
            clock.shared(),
        );
        Self {
            services,
            gateway,
            clock,
            notifier,
            batches,
            sleeper,
        }
    }

    /// Create and activate a complete login using [`HARNESS_PASSWORD`].
    ///
    /// # Panics
    ///
    /// Panics when the credential store rejects the login.
    pub async fn activate_login(&self) -> CourierCredential {
        let draft = CredentialDraft {
            provider: Provider::tpc(),
            base_url: Url::parse("https://vendor.test/").ok(),
            username: "acme-logistics".to_owned(),
            password: Some(Zeroizing::new(HARNESS_PASSWORD.to_owned())),
            active: true,
        };
        match self.services.credentials.create(draft).await {
            Ok(credential) => credential,
            Err(error) => panic!("harness login rejected: {error}"),
        }
    }
}
