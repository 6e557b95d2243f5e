//! Consignment notes and the per-order batches that hold them.

use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CourierError;

/// Order identifier supplied by the dispatch workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Trim `raw` and reject blank identifiers.
    pub fn parse(raw: &str) -> Result<Self, CourierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CourierError::validation("order id must not be empty"));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positive number of consignment notes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsignmentQuantity(NonZeroU32);

impl ConsignmentQuantity {
    /// Largest number of notes one request may ask for.
    pub const MAX_PER_REQUEST: u32 = 1000;

    /// Reject zero and anything above [`Self::MAX_PER_REQUEST`].
    pub fn new(quantity: u32) -> Result<Self, CourierError> {
        if quantity > Self::MAX_PER_REQUEST {
            return Err(CourierError::validation(format!(
                "consignment quantity must not exceed {}",
                Self::MAX_PER_REQUEST
            )));
        }
        NonZeroU32::new(quantity)
            .map(Self)
            .ok_or_else(|| CourierError::validation("consignment quantity must be positive"))
    }

    /// The quantity as an integer.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ConsignmentQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consignment note number issued by the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsignmentNote(String);

impl ConsignmentNote {
    /// Wrap a vendor-issued number. Blank numbers are rejected.
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        let trimmed = number.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Borrow the number.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsignmentNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a consignment batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Allocation is in flight.
    Pending,
    /// Numbers were issued and recorded.
    Allocated,
    /// Allocation failed; a later request may retry.
    Failed,
}

impl BatchStatus {
    /// Stable lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Allocated => "allocated",
            Self::Failed => "failed",
        }
    }
}

/// Consignment notes allocated to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsignmentBatch {
    order_id: OrderId,
    quantity: ConsignmentQuantity,
    numbers: Vec<ConsignmentNote>,
    status: BatchStatus,
    failure_reason: Option<String>,
    requested_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ConsignmentBatch {
    /// Start a pending batch.
    pub const fn pending(
        order_id: OrderId,
        quantity: ConsignmentQuantity,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            quantity,
            numbers: Vec::new(),
            status: BatchStatus::Pending,
            failure_reason: None,
            requested_at,
            completed_at: None,
        }
    }

    /// Move to `allocated` with the issued numbers.
    #[must_use]
    pub fn allocated(mut self, numbers: Vec<ConsignmentNote>, at: DateTime<Utc>) -> Self {
        self.numbers = numbers;
        self.status = BatchStatus::Allocated;
        self.failure_reason = None;
        self.completed_at = Some(at);
        self
    }

    /// Move to `failed`, keeping the reason for operators.
    #[must_use]
    pub fn failed(mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.numbers.clear();
        self.status = BatchStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.completed_at = Some(at);
        self
    }

    /// Order the batch belongs to.
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Requested quantity.
    pub const fn quantity(&self) -> ConsignmentQuantity {
        self.quantity
    }

    /// Issued numbers; empty unless allocated.
    pub fn numbers(&self) -> &[ConsignmentNote] {
        &self.numbers
    }

    /// Current status.
    pub const fn status(&self) -> BatchStatus {
        self.status
    }

    /// Failure reason when failed.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// When the batch was first requested.
    pub const fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// When the batch reached a terminal state.
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}
