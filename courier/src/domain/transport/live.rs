//! Vendor-backed transport.
//!
//! Every call re-reads the provider's active credential, so deactivation takes
//! effect on the next call even for transports obtained earlier.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{CourierTransport, run_detached};
use crate::domain::ports::{
    CredentialRepository, SecretCipher, VendorAccess, VendorExchange, VendorGateway,
    VendorGatewayError,
};
use crate::domain::{
    ApiCallDraft, ApiName, AuditLogger, ConsignmentNote, ConsignmentQuantity, CourierError,
    LocalityMatch, LocalityQuery, Pincode, Provider, RetryPolicy, RetryRuntime,
    ServiceabilityReport,
};

/// Port bundle required by the live transport.
pub struct LiveTransportPorts {
    /// Credential storage consulted on every call.
    pub credentials: Arc<dyn CredentialRepository>,
    /// Cipher that opens the stored secret.
    pub cipher: Arc<dyn SecretCipher>,
    /// Vendor HTTP adapter.
    pub gateway: Arc<dyn VendorGateway>,
    /// Audit log for every completed call.
    pub audit: AuditLogger,
}

struct LiveInner {
    provider: Provider,
    credentials: Arc<dyn CredentialRepository>,
    cipher: Arc<dyn SecretCipher>,
    gateway: Arc<dyn VendorGateway>,
    audit: AuditLogger,
    clock: Arc<dyn Clock + Send + Sync>,
    runtime: RetryRuntime,
    policy: RetryPolicy,
}

/// Transport that calls the vendor with the provider's active credential.
#[derive(Clone)]
pub struct LiveCourierTransport {
    inner: Arc<LiveInner>,
}

impl LiveCourierTransport {
    /// Build a transport for `provider`.
    pub fn new(
        provider: Provider,
        ports: LiveTransportPorts,
        clock: Arc<dyn Clock + Send + Sync>,
        runtime: RetryRuntime,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(LiveInner {
                provider,
                credentials: ports.credentials,
                cipher: ports.cipher,
                gateway: ports.gateway,
                audit: ports.audit,
                clock,
                runtime,
                policy,
            }),
        }
    }

    /// Provider this transport serves.
    pub fn provider(&self) -> &Provider {
        &self.inner.provider
    }
}

#[async_trait]
impl CourierTransport for LiveCourierTransport {
    async fn check_serviceability(&self, pincode: &str) -> Result<ServiceabilityReport, CourierError> {
        let pincode = Pincode::parse(pincode)?;
        let inner = Arc::clone(&self.inner);
        run_detached(async move { inner.check_serviceability(pincode).await }).await
    }

    async fn search_locality(&self, query: &str) -> Result<Vec<LocalityMatch>, CourierError> {
        let query = LocalityQuery::parse(query)?;
        let inner = Arc::clone(&self.inner);
        run_detached(async move { inner.search_locality(query).await }).await
    }

    async fn request_consignment_notes(&self, quantity: u32) -> Result<Vec<ConsignmentNote>, CourierError> {
        let quantity = ConsignmentQuantity::new(quantity)?;
        let inner = Arc::clone(&self.inner);
        run_detached(async move { inner.request_consignment_notes(quantity).await }).await
    }
}

impl LiveInner {
    async fn check_serviceability(&self, pincode: Pincode) -> Result<ServiceabilityReport, CourierError> {
        let access = self.load_access().await?;
        let request_payload = json!({ "pincode": pincode.as_str() }).to_string();
        self.execute(ApiName::PincodeCheck, request_payload, || {
            self.gateway.pincode_service(&access, &pincode)
        })
        .await
    }

    async fn search_locality(&self, query: LocalityQuery) -> Result<Vec<LocalityMatch>, CourierError> {
        let access = self.load_access().await?;
        let request_payload = json!({ "areaName": query.as_str() }).to_string();
        let matches = self
            .execute(ApiName::LocalitySearch, request_payload, || {
                self.gateway.locality_search(&access, &query)
            })
            .await?;
        Ok(matches
            .into_iter()
            .filter(|found| query.matches(&found.area, &found.city))
            .collect())
    }

    async fn request_consignment_notes(
        &self,
        quantity: ConsignmentQuantity,
    ) -> Result<Vec<ConsignmentNote>, CourierError> {
        let access = self.load_access().await?;
        let request_payload = json!({
            "client": access.username.as_str(),
            "quantity": quantity.get(),
        })
        .to_string();
        self.execute(ApiName::ConsignmentRequest, request_payload, || {
            self.gateway.consignment_notes(&access, quantity)
        })
        .await
    }

    async fn load_access(&self) -> Result<VendorAccess, CourierError> {
        let credential = self
            .credentials
            .find_active(&self.provider)
            .await
            .map_err(|err| CourierError::internal(format!("credential lookup failed: {err}")))?
            .ok_or_else(|| {
                CourierError::config(format!("no active credential for provider {}", self.provider))
            })?;

        if let Some(field) = credential.missing_activation_field() {
            return Err(CourierError::config(format!(
                "active credential for provider {} has no {field}",
                self.provider
            )));
        }
        let (Some(base_url), Some(secret)) = (credential.base_url, credential.secret) else {
            return Err(CourierError::config("active credential is incomplete"));
        };
        let password = self
            .cipher
            .open(&self.provider, &secret)
            .map_err(|err| CourierError::config(format!("active credential unusable: {err}")))?;

        debug!(
            provider = %self.provider,
            credential_id = %credential.id,
            fingerprint = %secret.fingerprint(),
            "loaded courier credential"
        );
        Ok(VendorAccess {
            base_url,
            username: credential.username,
            password,
        })
    }

    async fn execute<T, F, Fut>(
        &self,
        api_name: ApiName,
        request_payload: String,
        call: F,
    ) -> Result<T, CourierError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<VendorExchange<T>, VendorGatewayError>>,
    {
        let max_attempts = self.policy.attempt_budget();
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(exchange) => {
                    info!(api_name = api_name.as_str(), attempt, "courier call succeeded");
                    self.audit
                        .record(ApiCallDraft::success(
                            api_name,
                            request_payload,
                            exchange.raw_response,
                            attempt,
                        ))
                        .await;
                    return Ok(exchange.value);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.runtime.jitter.jittered_delay(
                        self.policy.base_delay(attempt),
                        attempt,
                        self.clock.utc(),
                    );
                    warn!(
                        api_name = api_name.as_str(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "courier call failed; retrying"
                    );
                    self.runtime.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(self.fail(api_name, request_payload, err, attempt).await),
            }
        }
    }

    async fn fail(
        &self,
        api_name: ApiName,
        request_payload: String,
        err: VendorGatewayError,
        attempts: u32,
    ) -> CourierError {
        let message = err.to_string();
        let failure = match err {
            VendorGatewayError::InvalidRequest { message } => {
                warn!(api_name = api_name.as_str(), %message, "courier request could not be built");
                return CourierError::config(message);
            }
            VendorGatewayError::Rejected { raw_response, .. }
            | VendorGatewayError::Decode { raw_response, .. } => {
                CourierError::vendor(message, raw_response)
            }
            VendorGatewayError::Transport { .. }
            | VendorGatewayError::Timeout { .. }
            | VendorGatewayError::RateLimited { .. } => CourierError::transport(message, attempts),
        };
        let response_payload = failure.raw_response().map_or_else(
            || json!({ "error": failure.to_string(), "attempts": attempts }).to_string(),
            str::to_owned,
        );
        warn!(api_name = api_name.as_str(), attempts, error = %failure, "courier call failed");
        self.audit
            .record(ApiCallDraft::failed(
                api_name,
                request_payload,
                response_payload,
                attempts,
            ))
            .await;
        failure
    }
}
