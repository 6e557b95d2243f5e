//! Idempotent consignment note allocation per order.
//!
//! An order holds at most one live batch. Concurrent requests for the same
//! order join one in-flight allocation; the batch repository's claim step
//! guards against other processes racing on the same store.

use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, instrument, warn};

use super::ports::{
    AdminNotification, AdminNotifier, BatchClaim, ConsignmentBatchRepository,
    ConsignmentBatchRepositoryError, NotificationKind,
};
use super::single_flight::SingleFlight;
use super::transport::{CourierTransport, TransportSelector};
use super::{ConsignmentBatch, ConsignmentNote, ConsignmentQuantity, CourierError, OrderId};

/// Errors surfaced by [`ConsignmentAllocator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// Input validation or the courier call failed.
    #[error(transparent)]
    Courier(#[from] CourierError),
    /// The vendor handed out a number already held by another batch.
    #[error("consignment note {number} is already allocated to order {order_id}")]
    DuplicateConsignment { number: String, order_id: String },
    /// Batch storage failed.
    #[error("consignment batch storage failed: {message}")]
    Repository { message: String },
}

impl From<ConsignmentBatchRepositoryError> for AllocationError {
    fn from(value: ConsignmentBatchRepositoryError) -> Self {
        match value {
            ConsignmentBatchRepositoryError::DuplicateConsignment { number, order_id } => {
                Self::DuplicateConsignment { number, order_id }
            }
            other => Self::Repository {
                message: other.to_string(),
            },
        }
    }
}

impl From<JoinError> for AllocationError {
    fn from(value: JoinError) -> Self {
        Self::Courier(CourierError::from(value))
    }
}

impl AllocationError {
    fn notification_kind(&self) -> NotificationKind {
        match self {
            Self::Courier(CourierError::Vendor { .. }) => NotificationKind::ConsignmentStockUnavailable,
            _ => NotificationKind::ConsignmentAllocationFailed,
        }
    }
}

struct AllocatorInner {
    selector: Arc<dyn TransportSelector>,
    batches: Arc<dyn ConsignmentBatchRepository>,
    notifier: Arc<dyn AdminNotifier>,
    clock: Arc<dyn Clock + Send + Sync>,
}

/// Dispatch-facing consignment note allocation.
pub struct ConsignmentAllocator {
    inner: Arc<AllocatorInner>,
    flights: SingleFlight<OrderId, ConsignmentBatch, AllocationError>,
}

impl ConsignmentAllocator {
    /// Build an allocator.
    pub fn new(
        selector: Arc<dyn TransportSelector>,
        batches: Arc<dyn ConsignmentBatchRepository>,
        notifier: Arc<dyn AdminNotifier>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                selector,
                batches,
                notifier,
                clock,
            }),
            flights: SingleFlight::default(),
        }
    }

    /// Allocate `quantity` consignment notes to `order_id`.
    ///
    /// Returns the existing batch unchanged when the order already has a
    /// pending or allocated one, even if `quantity` differs. A failed batch
    /// is retried.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        order_id: &str,
        quantity: u32,
    ) -> Result<ConsignmentBatch, AllocationError> {
        let order_id = OrderId::parse(order_id)?;
        let quantity = ConsignmentQuantity::new(quantity)?;
        let inner = Arc::clone(&self.inner);
        let key = order_id.clone();
        self.flights
            .run(key, move || async move { inner.allocate(order_id, quantity).await })
            .await
    }

    /// Current batch for `order_id`, if any.
    pub async fn batch(&self, order_id: &str) -> Result<Option<ConsignmentBatch>, AllocationError> {
        let order_id = OrderId::parse(order_id)?;
        Ok(self.inner.batches.find(&order_id).await?)
    }
}

impl AllocatorInner {
    async fn allocate(
        &self,
        order_id: OrderId,
        quantity: ConsignmentQuantity,
    ) -> Result<ConsignmentBatch, AllocationError> {
        match self.batches.claim(&order_id, quantity, self.clock.utc()).await? {
            BatchClaim::Existing(batch) => {
                info!(order_id = %order_id, status = batch.status().as_str(), "reusing consignment batch");
                return Ok(batch);
            }
            BatchClaim::Claimed(_) => {}
        }

        let numbers = match self.request(quantity).await {
            Ok(numbers) => numbers,
            Err(err) => return Err(self.fail(&order_id, err.into()).await),
        };
        match self.batches.mark_allocated(&order_id, &numbers, self.clock.utc()).await {
            Ok(batch) => {
                info!(order_id = %order_id, count = numbers.len(), "consignment notes allocated");
                Ok(batch)
            }
            Err(err) => Err(self.fail(&order_id, err.into()).await),
        }
    }

    async fn request(&self, quantity: ConsignmentQuantity) -> Result<Vec<ConsignmentNote>, CourierError> {
        let transport = self.selector.current_transport().await?;
        transport.request_consignment_notes(quantity.get()).await
    }

    async fn fail(&self, order_id: &OrderId, err: AllocationError) -> AllocationError {
        let now = self.clock.utc();
        warn!(order_id = %order_id, error = %err, "consignment allocation failed");
        if let Err(store_err) = self.batches.mark_failed(order_id, &err.to_string(), now).await {
            error!(order_id = %order_id, error = %store_err, "failed to record failed consignment batch");
        }
        let notification = AdminNotification::new(
            err.notification_kind(),
            format!("Consignment allocation failed for order {order_id}: {err}"),
            Some(order_id.clone()),
            now,
        );
        if let Err(notify_err) = self.notifier.notify(&notification).await {
            warn!(order_id = %order_id, error = %notify_err, "failed to deliver allocation notification");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mockable::DefaultClock;
    use rstest::rstest;

    use super::*;
    use crate::domain::BatchStatus;
    use crate::domain::ports::{MockAdminNotifier, MockConsignmentBatchRepository};
    use crate::domain::transport::{
        ActiveTransport, MockTransportSelector, SimulationTransport,
    };
    use crate::domain::AuditLogger;
    use crate::domain::ports::FixtureAuditLogRepository;
    use crate::outbound::memory::{InMemoryConsignmentBatches, RecordingAdminNotifier};

    fn clock() -> Arc<dyn Clock + Send + Sync> {
        Arc::new(DefaultClock)
    }

    fn simulation_selector(calls: Arc<AtomicUsize>) -> MockTransportSelector {
        let audit = AuditLogger::new(Arc::new(FixtureAuditLogRepository), clock());
        let simulation = SimulationTransport::new(audit);
        let mut selector = MockTransportSelector::new();
        selector.expect_current_transport().returning(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(ActiveTransport::Simulation(simulation.clone()))
        });
        selector
    }

    fn failing_selector(error: CourierError) -> MockTransportSelector {
        let mut selector = MockTransportSelector::new();
        selector
            .expect_current_transport()
            .returning(move || Err(error.clone()));
        selector
    }

    #[tokio::test]
    async fn allocations_are_idempotent_per_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let allocator = ConsignmentAllocator::new(
            Arc::new(simulation_selector(Arc::clone(&calls))),
            Arc::new(InMemoryConsignmentBatches::new()),
            Arc::new(RecordingAdminNotifier::new()),
            clock(),
        );

        let first = allocator.allocate("ORD-1", 2).await.expect("first");
        let second = allocator.allocate("ORD-1", 5).await.expect("second");

        assert_eq!(first.status(), BatchStatus::Allocated);
        assert_eq!(first.numbers().len(), 2);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case("", 1)]
    #[case("ORD-1", 0)]
    #[case("ORD-1", ConsignmentQuantity::MAX_PER_REQUEST + 1)]
    #[case("ORD-1", u32::MAX)]
    #[tokio::test]
    async fn invalid_input_never_reaches_storage(#[case] order_id: &str, #[case] quantity: u32) {
        let mut batches = MockConsignmentBatchRepository::new();
        batches.expect_claim().never();
        let mut selector = MockTransportSelector::new();
        selector.expect_current_transport().never();
        let allocator = ConsignmentAllocator::new(
            Arc::new(selector),
            Arc::new(batches),
            Arc::new(RecordingAdminNotifier::new()),
            clock(),
        );

        let err = allocator.allocate(order_id, quantity).await.expect_err("invalid");
        assert!(matches!(err, AllocationError::Courier(CourierError::Validation { .. })));
    }

    #[tokio::test]
    async fn vendor_failures_mark_the_batch_and_alert_admins() {
        let notifier = Arc::new(RecordingAdminNotifier::new());
        let batches = Arc::new(InMemoryConsignmentBatches::new());
        let allocator = ConsignmentAllocator::new(
            Arc::new(failing_selector(CourierError::vendor(
                "consignment note stock not available",
                "{\"STATUS\":\"FAILED\"}",
            ))),
            Arc::clone(&batches) as Arc<dyn ConsignmentBatchRepository>,
            Arc::clone(&notifier) as Arc<dyn AdminNotifier>,
            clock(),
        );

        let err = allocator.allocate("ORD-9", 1).await.expect_err("vendor");
        assert!(matches!(err, AllocationError::Courier(CourierError::Vendor { .. })));

        let batch = allocator.batch("ORD-9").await.expect("find").expect("present");
        assert_eq!(batch.status(), BatchStatus::Failed);
        assert!(batch.failure_reason().is_some_and(|r| r.contains("stock")));

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 1);
        let alert = delivered.first().expect("alert");
        assert_eq!(alert.kind, NotificationKind::ConsignmentStockUnavailable);
        assert_eq!(alert.order_id.as_ref().map(OrderId::as_str), Some("ORD-9"));
    }

    #[tokio::test]
    async fn failed_batches_can_be_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let audit = AuditLogger::new(Arc::new(FixtureAuditLogRepository), clock());
        let simulation = SimulationTransport::new(audit);
        let mut selector = MockTransportSelector::new();
        let seen = Arc::clone(&attempts);
        selector.expect_current_transport().returning(move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CourierError::transport("timed out", 3))
            } else {
                Ok(ActiveTransport::Simulation(simulation.clone()))
            }
        });
        let allocator = ConsignmentAllocator::new(
            Arc::new(selector),
            Arc::new(InMemoryConsignmentBatches::new()),
            Arc::new(RecordingAdminNotifier::new()),
            clock(),
        );

        let err = allocator.allocate("ORD-2", 1).await.expect_err("transport");
        assert!(matches!(err, AllocationError::Courier(CourierError::Transport { .. })));

        let retried = allocator.allocate("ORD-2", 1).await.expect("retry");
        assert_eq!(retried.status(), BatchStatus::Allocated);
    }

    #[tokio::test]
    async fn duplicate_numbers_fail_the_second_order() {
        let mut transport_selector = MockTransportSelector::new();
        let audit = AuditLogger::new(Arc::new(FixtureAuditLogRepository), clock());
        let simulation = SimulationTransport::with_seed(audit, 7);
        transport_selector
            .expect_current_transport()
            .returning(move || Ok(ActiveTransport::Simulation(simulation.clone())));
        let batches = Arc::new(InMemoryConsignmentBatches::new());
        let now = DefaultClock.utc();
        let held = OrderId::parse("ORD-OLD").expect("order");
        batches
            .claim(&held, ConsignmentQuantity::new(1).expect("quantity"), now)
            .await
            .expect("claim");
        batches
            .mark_allocated(&held, &[ConsignmentNote::new("TPC000000007").expect("note")], now)
            .await
            .expect("allocate");
        let notifier = Arc::new(RecordingAdminNotifier::new());
        let allocator = ConsignmentAllocator::new(
            Arc::new(transport_selector),
            Arc::clone(&batches) as Arc<dyn ConsignmentBatchRepository>,
            Arc::clone(&notifier) as Arc<dyn AdminNotifier>,
            clock(),
        );

        let err = allocator.allocate("ORD-NEW", 1).await.expect_err("duplicate");
        assert_eq!(
            err,
            AllocationError::DuplicateConsignment {
                number: "TPC000000007".to_owned(),
                order_id: "ORD-OLD".to_owned(),
            }
        );
        let batch = allocator.batch("ORD-NEW").await.expect("find").expect("present");
        assert_eq!(batch.status(), BatchStatus::Failed);
        assert_eq!(
            notifier.delivered().first().map(|n| n.kind),
            Some(NotificationKind::ConsignmentAllocationFailed)
        );
    }

    #[tokio::test]
    async fn notifier_failures_do_not_mask_the_allocation_error() {
        let mut notifier = MockAdminNotifier::new();
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&reasons);
        notifier.expect_notify().times(1).returning(move |notification| {
            captured
                .lock()
                .expect("reasons")
                .push(notification.message.clone());
            Err(crate::domain::ports::AdminNotifierError::delivery("smtp down"))
        });
        let allocator = ConsignmentAllocator::new(
            Arc::new(failing_selector(CourierError::config("no active credential"))),
            Arc::new(InMemoryConsignmentBatches::new()),
            Arc::new(notifier),
            clock(),
        );

        let err = allocator.allocate("ORD-3", 1).await.expect_err("config");
        assert!(matches!(err, AllocationError::Courier(CourierError::Config { .. })));
        assert!(
            reasons
                .lock()
                .expect("reasons")
                .first()
                .is_some_and(|m| m.contains("ORD-3"))
        );
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_allocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let allocator = Arc::new(ConsignmentAllocator::new(
            Arc::new(simulation_selector(Arc::clone(&calls))),
            Arc::new(InMemoryConsignmentBatches::new()),
            Arc::new(RecordingAdminNotifier::new()),
            clock(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                tokio::spawn(async move { allocator.allocate("ORD-C", 3).await })
            })
            .collect();
        let mut batches = Vec::new();
        for handle in handles {
            batches.push(handle.await.expect("join").expect("allocate"));
        }

        assert!(batches.windows(2).all(|pair| pair.first() == pair.get(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
