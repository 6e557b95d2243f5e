//! Wiring of adapters into ready-to-use courier services.
//!
//! [`CourierServices::from_settings`] builds the production stack from
//! [`CourierSettings`]; [`CourierServices::wire`] accepts any set of port
//! implementations and is what test harnesses use.

use std::sync::Arc;
use std::time::Duration;

use mockable::{Clock, DefaultClock};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::CourierSettings;
use crate::domain::ports::{
    AdminNotifier, AuditLogRepository, AuditLogRepositoryError, ConsignmentBatchRepository,
    CredentialRepository, SecretCipher, VendorGateway,
};
use crate::domain::transport::SimulationTransport;
use crate::domain::{
    AuditLogger, ConsignmentAllocator, CourierError, CredentialDraft, CredentialStore,
    CredentialStoreError, CredentialStorePorts, Provider, RetryRuntime, ServiceabilityResolver,
    TransportOptions,
};
use crate::outbound::memory::{
    InMemoryAuditLog, InMemoryConsignmentBatches, InMemoryCredentials, RecordingAdminNotifier,
};
use crate::outbound::tpc::TpcHttpGateway;
use crate::outbound::{AesGcmSecretCipher, CipherKeyError, JsonlAuditLog};

/// Errors raised while assembling the services.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configured provider code is blank.
    #[error("invalid provider: {0}")]
    Provider(#[source] CourierError),
    /// The configured base URL does not parse.
    #[error("invalid vendor base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    /// The sealing key is malformed.
    #[error(transparent)]
    CipherKey(#[from] CipherKeyError),
    /// The durable audit log could not be opened.
    #[error(transparent)]
    AuditLog(#[from] AuditLogRepositoryError),
    /// The HTTP client could not be built.
    #[error("HTTP client could not be built: {message}")]
    HttpClient { message: String },
    /// The bootstrap credential was rejected.
    #[error(transparent)]
    Credential(#[from] CredentialStoreError),
}

/// Port implementations the services are built on.
pub struct CourierAdapters {
    /// Credential persistence.
    pub credentials: Arc<dyn CredentialRepository>,
    /// Secret sealing.
    pub cipher: Arc<dyn SecretCipher>,
    /// Vendor HTTP adapter.
    pub gateway: Arc<dyn VendorGateway>,
    /// Consignment batch persistence.
    pub batches: Arc<dyn ConsignmentBatchRepository>,
    /// Administrator alerts.
    pub notifier: Arc<dyn AdminNotifier>,
}

/// The courier client's public services.
#[derive(Clone)]
pub struct CourierServices {
    /// Credential management and transport selection.
    pub credentials: Arc<CredentialStore>,
    /// Audit log reader and writer.
    pub audit: AuditLogger,
    /// Checkout-facing serviceability lookups.
    pub resolver: Arc<ServiceabilityResolver>,
    /// Dispatch-facing consignment allocation.
    pub allocator: Arc<ConsignmentAllocator>,
}

impl CourierServices {
    /// Assemble the services over `adapters`.
    pub fn wire(
        provider: Provider,
        adapters: CourierAdapters,
        audit: AuditLogger,
        options: TransportOptions,
        cache_ttl: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let credentials = Arc::new(CredentialStore::new(
            provider,
            CredentialStorePorts {
                repository: adapters.credentials,
                cipher: adapters.cipher,
                gateway: adapters.gateway,
                audit: audit.clone(),
                notifier: Arc::clone(&adapters.notifier),
            },
            options,
            Arc::clone(&clock),
        ));
        let resolver = Arc::new(ServiceabilityResolver::new(
            Arc::clone(&credentials) as _,
            Arc::clone(&clock),
            cache_ttl,
        ));
        let allocator = Arc::new(ConsignmentAllocator::new(
            Arc::clone(&credentials) as _,
            adapters.batches,
            adapters.notifier,
            clock,
        ));
        Self {
            credentials,
            audit,
            resolver,
            allocator,
        }
    }

    /// Build the production stack from `settings`.
    ///
    /// Storage is in-memory apart from the optional JSON-lines audit log.
    /// When a username and password are configured they are stored and
    /// activated as the provider's credential.
    pub async fn from_settings(settings: &CourierSettings) -> Result<Self, BootstrapError> {
        let provider = Provider::parse(settings.provider()).map_err(BootstrapError::Provider)?;
        let base_url = settings.base_url()?;
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);

        let cipher = match settings.secret_key() {
            Some(key) => AesGcmSecretCipher::from_base64_key(key)?,
            None => {
                warn!("no secret key configured; sealed credentials will not survive a restart");
                AesGcmSecretCipher::ephemeral()
            }
        };
        let audit_log: Arc<dyn AuditLogRepository> = match settings.audit_log_path() {
            Some(path) => {
                info!(path = %path.display(), "using JSON-lines audit log");
                Arc::new(JsonlAuditLog::open(path)?)
            }
            None => Arc::new(InMemoryAuditLog::new()),
        };
        let gateway = TpcHttpGateway::new(settings.request_timeout()).map_err(|err| {
            BootstrapError::HttpClient {
                message: err.to_string(),
            }
        })?;

        let audit = AuditLogger::new(audit_log, Arc::clone(&clock));
        let options = TransportOptions {
            retry: settings.retry_policy(),
            runtime: RetryRuntime::default(),
            policy: settings.selection_policy(),
            simulation: Some(
                SimulationTransport::new(audit.clone()).with_latency(settings.simulation_latency()),
            ),
        };
        let adapters = CourierAdapters {
            credentials: Arc::new(InMemoryCredentials::new()),
            cipher: Arc::new(cipher),
            gateway: Arc::new(gateway),
            batches: Arc::new(InMemoryConsignmentBatches::new()),
            notifier: Arc::new(RecordingAdminNotifier::new()),
        };
        let services = Self::wire(
            provider.clone(),
            adapters,
            audit,
            options,
            settings.cache_ttl(),
            clock,
        );

        if let Some((username, password)) = settings.bootstrap_login() {
            services
                .credentials
                .create(CredentialDraft {
                    provider,
                    base_url: Some(base_url),
                    username: username.to_owned(),
                    password: Some(Zeroizing::new(password.to_owned())),
                    active: true,
                })
                .await?;
        } else {
            info!(provider = %provider, "no courier login configured; simulation fallback applies");
        }
        Ok(services)
    }
}
