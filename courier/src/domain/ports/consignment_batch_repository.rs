//! Port abstraction for consignment batches keyed by order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{ConsignmentBatch, ConsignmentNote, ConsignmentQuantity, OrderId};

/// Errors raised by batch storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsignmentBatchRepositoryError {
    /// A number is already recorded against another batch.
    #[error("consignment note {number} is already allocated to order {order_id}")]
    DuplicateConsignment { number: String, order_id: String },
    /// No batch exists for the order.
    #[error("no consignment batch for order {order_id}")]
    UnknownOrder { order_id: String },
    /// Storage backend is unavailable.
    #[error("consignment batch backend failed: {message}")]
    Backend { message: String },
}

impl ConsignmentBatchRepositoryError {
    /// Helper for backend failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Outcome of claiming an order for allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchClaim {
    /// A new pending batch was stored; the caller must allocate it.
    Claimed(ConsignmentBatch),
    /// A pending or allocated batch already exists and is returned as-is.
    Existing(ConsignmentBatch),
}

/// Batch persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsignmentBatchRepository: Send + Sync {
    /// Store a pending batch for `order_id` unless a live one exists.
    ///
    /// A failed batch is replaced by a fresh pending batch.
    async fn claim(
        &self,
        order_id: &OrderId,
        quantity: ConsignmentQuantity,
        requested_at: DateTime<Utc>,
    ) -> Result<BatchClaim, ConsignmentBatchRepositoryError>;

    /// Record issued numbers.
    ///
    /// Fails with `DuplicateConsignment`, leaving the batch untouched, when
    /// any number is already recorded against any batch.
    async fn mark_allocated(
        &self,
        order_id: &OrderId,
        numbers: &[ConsignmentNote],
        at: DateTime<Utc>,
    ) -> Result<ConsignmentBatch, ConsignmentBatchRepositoryError>;

    /// Record a failed allocation.
    async fn mark_failed(
        &self,
        order_id: &OrderId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<ConsignmentBatch, ConsignmentBatchRepositoryError>;

    /// Load the batch for `order_id`.
    async fn find(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ConsignmentBatch>, ConsignmentBatchRepositoryError>;
}
