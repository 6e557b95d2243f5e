//! Domain primitives, services, and ports.
//!
//! Purpose: define the courier client's strongly typed values, the services
//! checkout and dispatch call, and the ports those services depend on.
//!
//! Public surface:
//! - Value types: `Pincode`, `LocalityQuery`, `OrderId`,
//!   `ConsignmentQuantity`, `ConsignmentNote`, `Provider`, `SealedSecret`.
//! - Records: `ServiceabilityReport`, `PincodeServiceability`,
//!   `LocalityMatch`, `ConsignmentBatch`, `CourierCredential`,
//!   `ApiCallRecord`.
//! - Services: `CredentialStore`, `AuditLogger`, `ServiceabilityResolver`,
//!   `ConsignmentAllocator`, and the transports in [`transport`].
//! - Errors: `CourierError` for courier calls, plus one error enum per
//!   service and port.

mod audit;
mod audit_logger;
mod consignment;
mod consignment_allocator;
mod credential;
mod credential_store;
mod error;
mod pincode;
mod retry;
mod serviceability;
mod serviceability_resolver;
mod single_flight;

pub mod ports;
pub mod transport;

pub use self::audit::{
    ApiCallDraft, ApiCallRecord, ApiName, AuditFilter, AuditSummary, CallStatus, UnknownLabel,
};
pub use self::audit_logger::{AuditExportError, AuditLogger, CSV_HEADER, render_csv};
pub use self::consignment::{
    BatchStatus, ConsignmentBatch, ConsignmentNote, ConsignmentQuantity, OrderId,
};
pub use self::consignment_allocator::{AllocationError, ConsignmentAllocator};
pub use self::credential::{
    CourierCredential, CredentialDraft, CredentialUpdate, Provider, SealedSecret,
};
pub use self::credential_store::{
    CredentialStore, CredentialStoreError, CredentialStorePorts, SelectionPolicy,
    TransportOptions,
};
pub use self::error::CourierError;
pub use self::pincode::{LocalityQuery, Pincode, PincodeValidationError};
pub use self::retry::{
    BackoffJitter, RandomJitter, RetryPolicy, RetryRuntime, RetrySleeper, TokioSleeper,
};
pub use self::serviceability::{
    LocalityMatch, PincodeServiceability, ServiceOptions, ServiceabilityReport,
};
pub use self::serviceability_resolver::{DEFAULT_CACHE_TTL, ServiceabilityResolver};
