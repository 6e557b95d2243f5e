//! In-memory audit log.

use std::sync::RwLock;

use async_trait::async_trait;

use super::poisoned;
use crate::domain::ports::{AuditLogRepository, AuditLogRepositoryError};
use crate::domain::{ApiCallRecord, AuditFilter};

/// Append-only vector of records, oldest first.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<ApiCallRecord>>,
}

impl InMemoryAuditLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLog {
    async fn append(&self, record: &ApiCallRecord) -> Result<(), AuditLogRepositoryError> {
        self.records
            .write()
            .map_err(|_| AuditLogRepositoryError::backend(poisoned("audit log")))?
            .push(record.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError> {
        let records = self
            .records
            .read()
            .map_err(|_| AuditLogRepositoryError::backend(poisoned("audit log")))?;
        Ok(filter.apply(records.iter().rev()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::domain::{ApiCallDraft, ApiName, CallStatus};

    #[tokio::test]
    async fn queries_return_most_recent_first() {
        let log = InMemoryAuditLog::new();
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
            .single()
            .expect("timestamp");
        for offset in 0..3 {
            let draft = ApiCallDraft::success(ApiName::PincodeCheck, "{}", offset.to_string(), 1);
            let record =
                ApiCallRecord::from_draft(draft, Uuid::new_v4(), start + TimeDelta::seconds(offset));
            log.append(&record).await.expect("append");
        }

        let records = log.query(&AuditFilter::all().with_limit(2)).await.expect("query");
        let payloads: Vec<&str> = records.iter().map(|r| r.response_payload.as_str()).collect();
        assert_eq!(payloads, ["2", "1"]);
        assert!(records.iter().all(|r| r.status == CallStatus::Success));
    }
}
