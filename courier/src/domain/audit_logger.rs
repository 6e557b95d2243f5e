//! Audit logger service: appends API call records and reads them back for
//! operators.

use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;
use tracing::{error, instrument};
use uuid::Uuid;

use super::ports::{AuditLogRepository, AuditLogRepositoryError};
use super::{ApiCallDraft, ApiCallRecord, AuditFilter, AuditSummary};

/// Column headers of the CSV export, in order.
pub const CSV_HEADER: [&str; 5] = ["Timestamp", "API Name", "Status", "Request", "Response"];

/// Errors raised while exporting the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditExportError {
    /// Records could not be read.
    #[error(transparent)]
    Repository(#[from] AuditLogRepositoryError),
    /// CSV encoding failed.
    #[error("audit export encoding failed: {message}")]
    Encoding { message: String },
}

impl AuditExportError {
    fn encoding(error: impl std::fmt::Display) -> Self {
        Self::Encoding {
            message: error.to_string(),
        }
    }
}

/// Front door to the audit log.
#[derive(Clone)]
pub struct AuditLogger {
    repository: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl AuditLogger {
    /// Create a logger over `repository`.
    pub fn new(repository: Arc<dyn AuditLogRepository>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { repository, clock }
    }

    /// Stamp `draft` with an id and the current time and persist it.
    pub async fn append(&self, draft: ApiCallDraft) -> Result<ApiCallRecord, AuditLogRepositoryError> {
        let record = ApiCallRecord::from_draft(draft, Uuid::new_v4(), self.clock.utc());
        self.repository.append(&record).await?;
        Ok(record)
    }

    /// Append without failing the caller; storage errors are logged.
    pub(crate) async fn record(&self, draft: ApiCallDraft) {
        let api_name = draft.api_name;
        let status = draft.status;
        if let Err(err) = self.append(draft).await {
            error!(
                api_name = api_name.as_str(),
                status = status.as_str(),
                error = %err,
                "failed to append api call record"
            );
        }
    }

    /// The `count` most recent records.
    pub async fn recent(&self, count: usize) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError> {
        self.repository
            .query(&AuditFilter::all().with_limit(count))
            .await
    }

    /// Records matching `filter`, most recent first.
    pub async fn filter(&self, filter: &AuditFilter) -> Result<Vec<ApiCallRecord>, AuditLogRepositoryError> {
        self.repository.query(filter).await
    }

    /// Export records matching `filter` as CSV with a header row.
    #[instrument(skip(self))]
    pub async fn export_csv(&self, filter: &AuditFilter) -> Result<String, AuditExportError> {
        let records = self.repository.query(filter).await?;
        render_csv(&records)
    }

    /// Counts by status and operation over the whole log.
    pub async fn summary(&self) -> Result<AuditSummary, AuditLogRepositoryError> {
        let records = self.repository.query(&AuditFilter::all()).await?;
        Ok(AuditSummary::tally(&records))
    }
}

/// Render `records` as CSV: one header row, one row per record.
pub fn render_csv(records: &[ApiCallRecord]) -> Result<String, AuditExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(AuditExportError::encoding)?;
    for record in records {
        let timestamp = record.timestamp.to_rfc3339();
        writer
            .write_record([
                timestamp.as_str(),
                record.api_name.as_str(),
                record.status.as_str(),
                record.request_payload.as_str(),
                record.response_payload.as_str(),
            ])
            .map_err(AuditExportError::encoding)?;
    }
    let bytes = writer.into_inner().map_err(AuditExportError::encoding)?;
    String::from_utf8(bytes).map_err(AuditExportError::encoding)
}
