//! In-memory credential repository.
//!
//! All mutations take the write lock, so activation and the deactivation of
//! the previous credential happen as one step.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::poisoned;
use crate::domain::ports::{CredentialRepository, CredentialRepositoryError};
use crate::domain::{CourierCredential, Provider};

/// Credentials keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryCredentials {
    credentials: RwLock<BTreeMap<Uuid, CourierCredential>>,
}

impl InMemoryCredentials {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Uuid, CourierCredential>>, CredentialRepositoryError> {
        self.credentials
            .read()
            .map_err(|_| CredentialRepositoryError::backend(poisoned("credential store")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Uuid, CourierCredential>>, CredentialRepositoryError> {
        self.credentials
            .write()
            .map_err(|_| CredentialRepositoryError::backend(poisoned("credential store")))
    }
}

fn oldest_first(mut credentials: Vec<CourierCredential>) -> Vec<CourierCredential> {
    credentials.sort_by_key(|credential| (credential.created_at, credential.id));
    credentials
}

#[async_trait]
impl CredentialRepository for InMemoryCredentials {
    async fn insert(&self, credential: &CourierCredential) -> Result<(), CredentialRepositoryError> {
        let mut credentials = self.write()?;
        if credentials.contains_key(&credential.id) {
            return Err(CredentialRepositoryError::Duplicate { id: credential.id });
        }
        let mut stored = credential.clone();
        stored.active = false;
        credentials.insert(stored.id, stored);
        Ok(())
    }

    async fn save_details(
        &self,
        credential: &CourierCredential,
    ) -> Result<CourierCredential, CredentialRepositoryError> {
        let mut credentials = self.write()?;
        let stored = credentials
            .get_mut(&credential.id)
            .ok_or(CredentialRepositoryError::NotFound { id: credential.id })?;
        stored.base_url.clone_from(&credential.base_url);
        stored.username.clone_from(&credential.username);
        stored.secret.clone_from(&credential.secret);
        stored.updated_at = credential.updated_at;
        Ok(stored.clone())
    }

    async fn find(&self, id: Uuid) -> Result<Option<CourierCredential>, CredentialRepositoryError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn list(&self, provider: &Provider) -> Result<Vec<CourierCredential>, CredentialRepositoryError> {
        let matching = self
            .read()?
            .values()
            .filter(|credential| &credential.provider == provider)
            .cloned()
            .collect();
        Ok(oldest_first(matching))
    }

    async fn find_active(
        &self,
        provider: &Provider,
    ) -> Result<Option<CourierCredential>, CredentialRepositoryError> {
        Ok(self
            .read()?
            .values()
            .find(|credential| credential.active && &credential.provider == provider)
            .cloned())
    }

    async fn activate_exclusive(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<CourierCredential, CredentialRepositoryError> {
        let mut credentials = self.write()?;
        let provider = credentials
            .get(&id)
            .map(|credential| credential.provider.clone())
            .ok_or(CredentialRepositoryError::NotFound { id })?;
        for credential in credentials.values_mut() {
            if credential.provider != provider {
                continue;
            }
            let should_be_active = credential.id == id;
            if credential.active != should_be_active {
                credential.active = should_be_active;
                credential.updated_at = at;
            }
        }
        credentials
            .get(&id)
            .cloned()
            .ok_or(CredentialRepositoryError::NotFound { id })
    }

    async fn deactivate(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<CourierCredential, CredentialRepositoryError> {
        let mut credentials = self.write()?;
        let credential = credentials
            .get_mut(&id)
            .ok_or(CredentialRepositoryError::NotFound { id })?;
        if credential.active {
            credential.active = false;
            credential.updated_at = at;
        }
        Ok(credential.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, CredentialRepositoryError> {
        Ok(self.write()?.remove(&id).is_some())
    }
}
