//! Port abstraction for storing courier credentials.
//!
//! The active flag is only changed through [`CredentialRepository::activate_exclusive`]
//! and [`CredentialRepository::deactivate`], so an adapter can keep "at most
//! one active credential per provider" atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{CourierCredential, Provider};

/// Errors raised by credential storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialRepositoryError {
    /// No credential with the given id exists.
    #[error("credential {id} not found")]
    NotFound { id: Uuid },
    /// A credential with the given id already exists.
    #[error("credential {id} already exists")]
    Duplicate { id: Uuid },
    /// Storage backend is unavailable.
    #[error("credential store backend failed: {message}")]
    Backend { message: String },
}

impl CredentialRepositoryError {
    /// Helper for backend failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Credential persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Store a new credential. Its active flag is stored as inactive.
    async fn insert(&self, credential: &CourierCredential) -> Result<(), CredentialRepositoryError>;

    /// Overwrite every field except `active` and `created_at`.
    async fn save_details(
        &self,
        credential: &CourierCredential,
    ) -> Result<CourierCredential, CredentialRepositoryError>;

    /// Load one credential.
    async fn find(&self, id: Uuid) -> Result<Option<CourierCredential>, CredentialRepositoryError>;

    /// All credentials for `provider`, oldest first.
    async fn list(&self, provider: &Provider) -> Result<Vec<CourierCredential>, CredentialRepositoryError>;

    /// The active credential for `provider`, if any.
    async fn find_active(
        &self,
        provider: &Provider,
    ) -> Result<Option<CourierCredential>, CredentialRepositoryError>;

    /// Mark `id` active and every other credential of its provider inactive.
    async fn activate_exclusive(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<CourierCredential, CredentialRepositoryError>;

    /// Mark `id` inactive.
    async fn deactivate(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<CourierCredential, CredentialRepositoryError>;

    /// Remove `id`; returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, CredentialRepositoryError>;
}
