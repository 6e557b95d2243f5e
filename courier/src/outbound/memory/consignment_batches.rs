//! In-memory consignment batch repository.
//!
//! One mutex guards both the per-order batches and the index of issued
//! numbers, so claim and uniqueness checks are compare-and-set operations.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::poisoned;
use crate::domain::ports::{BatchClaim, ConsignmentBatchRepository, ConsignmentBatchRepositoryError};
use crate::domain::{
    BatchStatus, ConsignmentBatch, ConsignmentNote, ConsignmentQuantity, OrderId,
};

#[derive(Debug, Default)]
struct BatchState {
    batches: BTreeMap<OrderId, ConsignmentBatch>,
    issued: HashMap<ConsignmentNote, OrderId>,
}

/// Batches keyed by order id.
#[derive(Debug, Default)]
pub struct InMemoryConsignmentBatches {
    state: Mutex<BatchState>,
}

impl InMemoryConsignmentBatches {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BatchState>, ConsignmentBatchRepositoryError> {
        self.state
            .lock()
            .map_err(|_| ConsignmentBatchRepositoryError::backend(poisoned("consignment batches")))
    }
}

#[async_trait]
impl ConsignmentBatchRepository for InMemoryConsignmentBatches {
    async fn claim(
        &self,
        order_id: &OrderId,
        quantity: ConsignmentQuantity,
        requested_at: DateTime<Utc>,
    ) -> Result<BatchClaim, ConsignmentBatchRepositoryError> {
        let mut state = self.lock()?;
        let live = state
            .batches
            .get(order_id)
            .filter(|existing| existing.status() != BatchStatus::Failed);
        if let Some(existing) = live {
            return Ok(BatchClaim::Existing(existing.clone()));
        }
        let pending = ConsignmentBatch::pending(order_id.clone(), quantity, requested_at);
        state.batches.insert(order_id.clone(), pending.clone());
        Ok(BatchClaim::Claimed(pending))
    }

    async fn mark_allocated(
        &self,
        order_id: &OrderId,
        numbers: &[ConsignmentNote],
        at: DateTime<Utc>,
    ) -> Result<ConsignmentBatch, ConsignmentBatchRepositoryError> {
        let mut state = self.lock()?;
        let mut seen = HashSet::new();
        for number in numbers {
            if let Some(owner) = state.issued.get(number) {
                return Err(ConsignmentBatchRepositoryError::DuplicateConsignment {
                    number: number.to_string(),
                    order_id: owner.to_string(),
                });
            }
            if !seen.insert(number) {
                return Err(ConsignmentBatchRepositoryError::DuplicateConsignment {
                    number: number.to_string(),
                    order_id: order_id.to_string(),
                });
            }
        }

        let batch = state
            .batches
            .remove(order_id)
            .ok_or_else(|| ConsignmentBatchRepositoryError::UnknownOrder {
                order_id: order_id.to_string(),
            })?;
        let allocated = batch.allocated(numbers.to_vec(), at);
        for number in numbers {
            state.issued.insert(number.clone(), order_id.clone());
        }
        state.batches.insert(order_id.clone(), allocated.clone());
        Ok(allocated)
    }

    async fn mark_failed(
        &self,
        order_id: &OrderId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<ConsignmentBatch, ConsignmentBatchRepositoryError> {
        let mut state = self.lock()?;
        let batch = state
            .batches
            .remove(order_id)
            .ok_or_else(|| ConsignmentBatchRepositoryError::UnknownOrder {
                order_id: order_id.to_string(),
            })?;
        let failed = batch.failed(reason, at);
        state.batches.insert(order_id.clone(), failed.clone());
        Ok(failed)
    }

    async fn find(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ConsignmentBatch>, ConsignmentBatchRepositoryError> {
        Ok(self.lock()?.batches.get(order_id).cloned())
    }
}
