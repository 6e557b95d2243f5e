//! Port abstraction for persisting and reading API call records.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ApiCallRecord, AuditFilter};

/// Errors raised by audit log storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditLogRepositoryError {
    /// Storage backend is unavailable.
    #[error("audit log backend failed: {message}")]
    Backend { message: String },
    /// Record could not be encoded or decoded.
    #[error("audit log record malformed: {message}")]
    Serialization { message: String },
}

impl AuditLogRepositoryError {
    /// Helper for backend failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Helper for encoding failures.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Append-only store of [`ApiCallRecord`]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Persist `record`. Records are never updated afterwards.
    async fn append(&self, record: &ApiCallRecord) -> Result<(), AuditLogRepositoryError>;

    /// Records matching `filter`, most recent first.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError>;
}

/// Fixture that stores nothing and returns nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureAuditLogRepository;

#[async_trait]
impl AuditLogRepository for FixtureAuditLogRepository {
    async fn append(&self, _record: &ApiCallRecord) -> Result<(), AuditLogRepositoryError> {
        Ok(())
    }

    async fn query(&self, _filter: &AuditFilter) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError> {
        Ok(Vec::new())
    }
}
