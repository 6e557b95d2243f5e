//! Courier client configuration loaded via OrthoConfig.
//!
//! Every field is optional; accessors supply the defaults. Values come from
//! `COURIER_*` environment variables or a configuration file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{RetryPolicy, SelectionPolicy};

const DEFAULT_PROVIDER: &str = "TPC";
const DEFAULT_BASE_URL: &str = "https://www.tpcglobe.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Settings for the courier client and `courierctl`.
#[derive(Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct CourierSettings {
    /// Provider code credentials are stored under.
    pub provider: Option<String>,
    /// Vendor API base URL for the bootstrap credential.
    pub base_url: Option<String>,
    /// Per-attempt request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Network attempts per logical call.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: Option<u64>,
    /// Upper bound on retry delays, in milliseconds.
    pub max_backoff_ms: Option<u64>,
    /// Serviceability cache TTL in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// Use the simulation when no credential is active.
    pub simulation_fallback: Option<bool>,
    /// Artificial delay for simulated calls, in milliseconds.
    pub simulation_latency_ms: Option<u64>,
    /// Base64 AES-256 key for sealing credential secrets.
    pub secret_key: Option<String>,
    /// Vendor account name for the bootstrap credential.
    pub username: Option<String>,
    /// Vendor password for the bootstrap credential.
    pub password: Option<String>,
    /// JSON-lines audit log; in-memory when unset.
    pub audit_log_path: Option<PathBuf>,
}

impl fmt::Debug for CourierSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("CourierSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("simulation_fallback", &self.simulation_fallback)
            .field("simulation_latency_ms", &self.simulation_latency_ms)
            .field("secret_key", &redacted(&self.secret_key))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("audit_log_path", &self.audit_log_path)
            .finish()
    }
}

impl CourierSettings {
    /// Provider code, defaulting to `TPC`.
    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Vendor base URL, defaulting to the public TPC host.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
    }

    /// Per-attempt timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        )
    }

    /// Retry policy with configured overrides.
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: self
                .initial_backoff_ms
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: self
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
        }
    }

    /// Serviceability cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
    }

    /// Transport selection when no credential is active.
    pub fn selection_policy(&self) -> SelectionPolicy {
        if self.simulation_fallback.unwrap_or(true) {
            SelectionPolicy::FallbackToSimulation
        } else {
            SelectionPolicy::RequireLive
        }
    }

    /// Simulated call latency.
    pub fn simulation_latency(&self) -> Duration {
        Duration::from_millis(self.simulation_latency_ms.unwrap_or(0))
    }

    /// Configured sealing key, if any.
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Username and password for the bootstrap credential when both are set.
    pub fn bootstrap_login(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.trim().is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }

    /// Durable audit log path, if configured.
    pub fn audit_log_path(&self) -> Option<&Path> {
        self.audit_log_path.as_deref()
    }
}
