//! Audit records of vendor API calls and the filters used to read them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Vendor operation an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApiName {
    /// Pincode serviceability check.
    #[serde(rename = "PincodeCheck")]
    PincodeCheck,
    /// Locality to pincode search.
    #[serde(rename = "LocalitySearch")]
    LocalitySearch,
    /// Consignment note request.
    #[serde(rename = "ConsignmentRequest")]
    ConsignmentRequest,
    /// Integration credential activation.
    #[serde(rename = "Setup")]
    Setup,
}

impl ApiName {
    /// Every operation, in display order.
    pub const ALL: [Self; 4] = [
        Self::PincodeCheck,
        Self::LocalitySearch,
        Self::ConsignmentRequest,
        Self::Setup,
    ];

    /// Stable label used in storage and exports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PincodeCheck => "PincodeCheck",
            Self::LocalitySearch => "LocalitySearch",
            Self::ConsignmentRequest => "ConsignmentRequest",
            Self::Setup => "Setup",
        }
    }
}

impl fmt::Display for ApiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised label passed to a `FromStr` impl in this module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownLabel {
    kind: &'static str,
    value: String,
}

impl FromStr for ApiName {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownLabel {
                kind: "api name",
                value: value.to_owned(),
            })
    }
}

/// Outcome of an audited call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Vendor answered with a usable payload.
    Success,
    /// Call ended in a transport or vendor error.
    Failed,
}

impl CallStatus {
    /// Stable lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(UnknownLabel {
                kind: "call status",
                value: value.to_owned(),
            }),
        }
    }
}

/// Record content supplied by the caller; id and timestamp are assigned on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCallDraft {
    /// Operation performed.
    pub api_name: ApiName,
    /// Request payload as JSON text, secrets excluded.
    pub request_payload: String,
    /// Raw response body or error description.
    pub response_payload: String,
    /// Outcome.
    pub status: CallStatus,
    /// Network attempts the logical call consumed.
    pub attempts: u32,
}

impl ApiCallDraft {
    /// Draft a successful call.
    pub fn success(
        api_name: ApiName,
        request_payload: impl Into<String>,
        response_payload: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            api_name,
            request_payload: request_payload.into(),
            response_payload: response_payload.into(),
            status: CallStatus::Success,
            attempts,
        }
    }

    /// Draft a failed call.
    pub fn failed(
        api_name: ApiName,
        request_payload: impl Into<String>,
        response_payload: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            status: CallStatus::Failed,
            ..Self::success(api_name, request_payload, response_payload, attempts)
        }
    }
}

/// Immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallRecord {
    /// Unique record id.
    pub id: Uuid,
    /// Operation performed.
    pub api_name: ApiName,
    /// Request payload as JSON text.
    pub request_payload: String,
    /// Raw response body or error description.
    pub response_payload: String,
    /// Outcome.
    pub status: CallStatus,
    /// Network attempts consumed.
    #[serde(default = "one_attempt")]
    pub attempts: u32,
    /// When the record was appended.
    pub timestamp: DateTime<Utc>,
}

const fn one_attempt() -> u32 {
    1
}

impl ApiCallRecord {
    /// Stamp a draft.
    pub fn from_draft(draft: ApiCallDraft, id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            api_name: draft.api_name,
            request_payload: draft.request_payload,
            response_payload: draft.response_payload,
            status: draft.status,
            attempts: draft.attempts,
            timestamp,
        }
    }
}

/// Selection criteria for reading the audit log.
///
/// Results are always ordered most recent first; `limit` truncates after
/// filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Keep only records with this status.
    pub status: Option<CallStatus>,
    /// Keep only records for this operation.
    pub api_name: Option<ApiName>,
    /// Keep at most this many records.
    pub limit: Option<usize>,
}

impl AuditFilter {
    /// Everything, unbounded.
    pub const fn all() -> Self {
        Self {
            status: None,
            api_name: None,
            limit: None,
        }
    }

    /// Restrict to one status.
    #[must_use]
    pub const fn with_status(mut self, status: CallStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to one operation.
    #[must_use]
    pub const fn with_api_name(mut self, api_name: ApiName) -> Self {
        self.api_name = Some(api_name);
        self
    }

    /// Cap the number of records.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` passes the status and operation criteria.
    pub fn matches(&self, record: &ApiCallRecord) -> bool {
        self.status.is_none_or(|status| status == record.status)
            && self.api_name.is_none_or(|name| name == record.api_name)
    }

    /// Apply the criteria to records already sorted most recent first.
    pub fn apply<'a, I>(&self, records: I) -> Vec<ApiCallRecord>
    where
        I: IntoIterator<Item = &'a ApiCallRecord>,
    {
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Aggregate counts over the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    /// Total records.
    pub total: usize,
    /// Successful records.
    pub success: usize,
    /// Failed records.
    pub failed: usize,
    /// Record count per operation.
    pub by_api: BTreeMap<ApiName, usize>,
}

impl AuditSummary {
    /// Tally `records`.
    pub fn tally<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ApiCallRecord>,
    {
        records.into_iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            match record.status {
                CallStatus::Success => summary.success += 1,
                CallStatus::Failed => summary.failed += 1,
            }
            *summary.by_api.entry(record.api_name).or_default() += 1;
            summary
        })
    }

    /// Share of successful calls as a whole percentage; zero when empty.
    pub fn success_rate_percent(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        (self.success * 100 + self.total / 2) / self.total
    }
}
