//! Courier integration credentials.
//!
//! Secrets only exist in two shapes: [`SealedSecret`] at rest and
//! `Zeroizing<String>` in memory for the duration of one vendor call. Neither
//! renders its content through `Debug`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::CourierError;

const FINGERPRINT_BYTES: usize = 8;

/// Courier provider name, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provider(String);

impl Provider {
    /// The provider this client integrates with.
    pub fn tpc() -> Self {
        Self("TPC".to_owned())
    }

    /// Trim and upper-case `raw`; blank names are rejected.
    pub fn parse(raw: &str) -> Result<Self, CourierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CourierError::validation("provider must not be empty"));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Borrow the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encrypted credential secret as stored at rest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(String);

impl SealedSecret {
    /// Wrap cipher output.
    pub const fn new(sealed: String) -> Self {
        Self(sealed)
    }

    /// Borrow the sealed text.
    pub fn expose_sealed(&self) -> &str {
        &self.0
    }

    /// Short non-reversible identifier for logs.
    ///
    /// SHA-256 of the sealed text, first eight bytes hex encoded.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(digest.get(..FINGERPRINT_BYTES).unwrap_or_default())
    }
}

impl fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SealedSecret")
            .field(&self.fingerprint())
            .finish()
    }
}

/// Stored courier credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierCredential {
    /// Unique id.
    pub id: Uuid,
    /// Provider the credential is for.
    pub provider: Provider,
    /// Vendor API base URL.
    pub base_url: Option<Url>,
    /// Vendor account name.
    pub username: String,
    /// Sealed vendor password.
    pub secret: Option<SealedSecret>,
    /// Whether this is the provider's active credential.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl CourierCredential {
    /// First field that must be set before the credential can be active.
    pub fn missing_activation_field(&self) -> Option<&'static str> {
        if self.username.trim().is_empty() {
            Some("username")
        } else if self.secret.is_none() {
            Some("password")
        } else if self.base_url.is_none() {
            Some("base_url")
        } else {
            None
        }
    }

    /// Fingerprint of the sealed secret, for logs.
    pub fn fingerprint(&self) -> Option<String> {
        self.secret.as_ref().map(SealedSecret::fingerprint)
    }
}

/// Input for creating a credential.
#[derive(Clone)]
pub struct CredentialDraft {
    /// Provider the credential is for.
    pub provider: Provider,
    /// Vendor API base URL.
    pub base_url: Option<Url>,
    /// Vendor account name.
    pub username: String,
    /// Plaintext password; sealed before storage.
    pub password: Option<Zeroizing<String>>,
    /// Activate immediately.
    pub active: bool,
}

impl fmt::Debug for CredentialDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDraft")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("active", &self.active)
            .finish()
    }
}

/// Partial update of a credential; `None` leaves a field unchanged.
#[derive(Clone, Default)]
pub struct CredentialUpdate {
    /// New base URL.
    pub base_url: Option<Url>,
    /// New account name.
    pub username: Option<String>,
    /// New plaintext password.
    pub password: Option<Zeroizing<String>>,
    /// Activate (`true`) or deactivate (`false`).
    pub active: Option<bool>,
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("active", &self.active)
            .finish()
    }
}
