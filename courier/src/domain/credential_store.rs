//! Credential store service and live/simulation transport selection.
//!
//! Secrets are sealed through [`SecretCipher`] before they reach the
//! repository and only come back out through [`CredentialStore::reveal_secret`]
//! or inside a live transport call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::ports::{
    AdminNotification, AdminNotifier, CredentialRepository, CredentialRepositoryError,
    NotificationKind, SecretCipher, SecretCipherError, VendorGateway,
};
use super::transport::{
    ActiveTransport, LiveCourierTransport, LiveTransportPorts, SimulationTransport,
    TransportSelector,
};
use super::{
    ApiCallDraft, ApiName, AuditLogger, CourierCredential, CourierError, CredentialDraft,
    CredentialUpdate, Provider, RetryPolicy, RetryRuntime,
};

/// Errors raised by credential management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialStoreError {
    /// A field required for activation is unset.
    #[error("credential field `{field}` is required before activation")]
    MissingField { field: &'static str },
    /// No credential with this id.
    #[error("credential {id} not found")]
    NotFound { id: Uuid },
    /// Credential belongs to a different provider than this store manages.
    #[error("credential is for provider {found}, this store manages {expected}")]
    ProviderMismatch { expected: Provider, found: Provider },
    /// Storage failed.
    #[error("credential storage failed: {message}")]
    Repository { message: String },
    /// Sealing or opening the secret failed.
    #[error(transparent)]
    Cipher(#[from] SecretCipherError),
}

impl From<CredentialRepositoryError> for CredentialStoreError {
    fn from(error: CredentialRepositoryError) -> Self {
        match error {
            CredentialRepositoryError::NotFound { id } => Self::NotFound { id },
            other => Self::Repository {
                message: other.to_string(),
            },
        }
    }
}

/// What to do when no credential is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Use the simulation transport.
    #[default]
    FallbackToSimulation,
    /// Use the live transport, which fails with a configuration error.
    RequireLive,
}

/// Ports used by the credential store.
pub struct CredentialStorePorts {
    /// Credential persistence.
    pub repository: Arc<dyn CredentialRepository>,
    /// Secret sealing.
    pub cipher: Arc<dyn SecretCipher>,
    /// Vendor HTTP adapter handed to the live transport.
    pub gateway: Arc<dyn VendorGateway>,
    /// Audit log shared with the transports.
    pub audit: AuditLogger,
    /// Administrator alerts.
    pub notifier: Arc<dyn AdminNotifier>,
}

/// Transport tuning applied by the credential store.
#[derive(Clone, Default)]
pub struct TransportOptions {
    /// Retry budget for live calls.
    pub retry: RetryPolicy,
    /// Sleeper and jitter for live retries.
    pub runtime: RetryRuntime,
    /// Behaviour when nothing is active.
    pub policy: SelectionPolicy,
    /// Simulation transport to fall back to; defaults to a fresh one.
    pub simulation: Option<SimulationTransport>,
}

/// Credential CRUD plus transport selection for one provider.
pub struct CredentialStore {
    provider: Provider,
    repository: Arc<dyn CredentialRepository>,
    cipher: Arc<dyn SecretCipher>,
    audit: AuditLogger,
    notifier: Arc<dyn AdminNotifier>,
    clock: Arc<dyn Clock + Send + Sync>,
    live: LiveCourierTransport,
    simulation: SimulationTransport,
    policy: SelectionPolicy,
}

impl CredentialStore {
    /// Build a store for `provider`.
    pub fn new(
        provider: Provider,
        ports: CredentialStorePorts,
        options: TransportOptions,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let live = LiveCourierTransport::new(
            provider.clone(),
            LiveTransportPorts {
                credentials: Arc::clone(&ports.repository),
                cipher: Arc::clone(&ports.cipher),
                gateway: ports.gateway,
                audit: ports.audit.clone(),
            },
            Arc::clone(&clock),
            options.runtime,
            options.retry,
        );
        let simulation = options
            .simulation
            .unwrap_or_else(|| SimulationTransport::new(ports.audit.clone()));
        Self {
            provider,
            repository: ports.repository,
            cipher: ports.cipher,
            audit: ports.audit,
            notifier: ports.notifier,
            clock,
            live,
            simulation,
            policy: options.policy,
        }
    }

    /// Provider this store manages.
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Create a credential, activating it when `draft.active` is set.
    pub async fn create(&self, draft: CredentialDraft) -> Result<CourierCredential, CredentialStoreError> {
        if draft.provider != self.provider {
            return Err(CredentialStoreError::ProviderMismatch {
                expected: self.provider.clone(),
                found: draft.provider,
            });
        }
        let now = self.clock.utc();
        let secret = draft
            .password
            .as_deref()
            .map(|password| self.cipher.seal(&self.provider, password))
            .transpose()?;
        let credential = CourierCredential {
            id: Uuid::new_v4(),
            provider: draft.provider,
            base_url: draft.base_url,
            username: draft.username.trim().to_owned(),
            secret,
            active: false,
            created_at: now,
            updated_at: now,
        };
        if draft.active {
            ensure_activatable(&credential)?;
        }
        self.repository.insert(&credential).await?;
        info!(
            provider = %credential.provider,
            credential_id = %credential.id,
            "courier credential created"
        );

        if draft.active {
            return self.activate(credential.id).await;
        }
        Ok(credential)
    }

    /// Apply `update` to credential `id`.
    pub async fn update(
        &self,
        id: Uuid,
        update: CredentialUpdate,
    ) -> Result<CourierCredential, CredentialStoreError> {
        let mut credential = self.get(id).await?;
        if let Some(base_url) = update.base_url {
            credential.base_url = Some(base_url);
        }
        if let Some(username) = update.username {
            credential.username = username.trim().to_owned();
        }
        if let Some(password) = update.password.as_deref() {
            credential.secret = Some(self.cipher.seal(&self.provider, password)?);
        }
        let will_be_active = update.active.unwrap_or(credential.active);
        if will_be_active {
            ensure_activatable(&credential)?;
        }
        credential.updated_at = self.clock.utc();
        let saved = self.repository.save_details(&credential).await?;

        match update.active {
            Some(true) if !saved.active => self.activate(id).await,
            Some(false) if saved.active => self.deactivate(id).await,
            _ => Ok(saved),
        }
    }

    /// Load credential `id`.
    pub async fn get(&self, id: Uuid) -> Result<CourierCredential, CredentialStoreError> {
        self.repository
            .find(id)
            .await?
            .ok_or(CredentialStoreError::NotFound { id })
    }

    /// Every credential for this provider, oldest first.
    pub async fn list(&self) -> Result<Vec<CourierCredential>, CredentialStoreError> {
        Ok(self.repository.list(&self.provider).await?)
    }

    /// The active credential, if any.
    pub async fn active(&self) -> Result<Option<CourierCredential>, CredentialStoreError> {
        Ok(self.repository.find_active(&self.provider).await?)
    }

    /// Remove credential `id`.
    pub async fn delete(&self, id: Uuid) -> Result<(), CredentialStoreError> {
        if self.repository.delete(id).await? {
            info!(provider = %self.provider, credential_id = %id, "courier credential deleted");
            Ok(())
        } else {
            Err(CredentialStoreError::NotFound { id })
        }
    }

    /// Make `id` the single active credential for the provider.
    pub async fn activate(&self, id: Uuid) -> Result<CourierCredential, CredentialStoreError> {
        let credential = self.get(id).await?;
        ensure_activatable(&credential)?;
        let now = self.clock.utc();
        let activated = self.repository.activate_exclusive(id, now).await?;
        info!(
            provider = %activated.provider,
            credential_id = %activated.id,
            credential_fingerprint = activated.fingerprint().as_deref().unwrap_or("none"),
            "courier credential activated"
        );
        self.record_setup(&activated, now).await;
        Ok(activated)
    }

    /// Deactivate `id`; later live calls fail until another is activated.
    pub async fn deactivate(&self, id: Uuid) -> Result<CourierCredential, CredentialStoreError> {
        let deactivated = self.repository.deactivate(id, self.clock.utc()).await?;
        info!(
            provider = %deactivated.provider,
            credential_id = %deactivated.id,
            "courier credential deactivated"
        );
        Ok(deactivated)
    }

    /// Decrypt the stored secret of `id`.
    pub async fn reveal_secret(&self, id: Uuid) -> Result<Option<Zeroizing<String>>, CredentialStoreError> {
        let credential = self.get(id).await?;
        let Some(secret) = credential.secret.as_ref() else {
            return Ok(None);
        };
        warn!(
            provider = %credential.provider,
            credential_id = %credential.id,
            credential_fingerprint = %secret.fingerprint(),
            "courier credential secret revealed"
        );
        Ok(Some(self.cipher.open(&credential.provider, secret)?))
    }

    async fn record_setup(&self, credential: &CourierCredential, at: DateTime<Utc>) {
        let request = json!({
            "action": "activate",
            "provider": credential.provider.as_str(),
            "credentialId": credential.id,
            "baseUrl": credential.base_url.as_ref().map(url::Url::as_str),
        });
        let response = json!({
            "status": "success",
            "message": format!("{} integration activated", credential.provider),
        });
        self.audit
            .record(ApiCallDraft::success(
                ApiName::Setup,
                request.to_string(),
                response.to_string(),
                1,
            ))
            .await;

        let notification = AdminNotification::new(
            NotificationKind::IntegrationSetup,
            format!("{} courier integration is active", credential.provider),
            None,
            at,
        );
        if let Err(err) = self.notifier.notify(&notification).await {
            warn!(error = %err, "failed to deliver integration setup notification");
        }
    }
}

fn ensure_activatable(credential: &CourierCredential) -> Result<(), CredentialStoreError> {
    credential
        .missing_activation_field()
        .map_or(Ok(()), |field| Err(CredentialStoreError::MissingField { field }))
}

#[async_trait]
impl TransportSelector for CredentialStore {
    async fn current_transport(&self) -> Result<ActiveTransport, CourierError> {
        if self.policy == SelectionPolicy::RequireLive {
            return Ok(ActiveTransport::Live(self.live.clone()));
        }
        let active = self
            .repository
            .find_active(&self.provider)
            .await
            .map_err(|err| CourierError::internal(format!("credential lookup failed: {err}")))?;
        Ok(match active {
            Some(_) => ActiveTransport::Live(self.live.clone()),
            None => ActiveTransport::Simulation(self.simulation.clone()),
        })
    }
}
