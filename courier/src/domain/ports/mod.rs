//! Domain ports and supporting types for the hexagonal boundary.

mod admin_notifier;
mod audit_log_repository;
mod consignment_batch_repository;
mod credential_repository;
mod secret_cipher;
mod vendor_gateway;

#[cfg(test)]
pub use admin_notifier::MockAdminNotifier;
pub use admin_notifier::{
    AdminNotification, AdminNotifier, AdminNotifierError, FixtureAdminNotifier, NotificationKind,
};
#[cfg(test)]
pub use audit_log_repository::MockAuditLogRepository;
pub use audit_log_repository::{
    AuditLogRepository, AuditLogRepositoryError, FixtureAuditLogRepository,
};
#[cfg(test)]
pub use consignment_batch_repository::MockConsignmentBatchRepository;
pub use consignment_batch_repository::{
    BatchClaim, ConsignmentBatchRepository, ConsignmentBatchRepositoryError,
};
#[cfg(test)]
pub use credential_repository::MockCredentialRepository;
pub use credential_repository::{CredentialRepository, CredentialRepositoryError};
#[cfg(test)]
pub use secret_cipher::MockSecretCipher;
pub use secret_cipher::{SecretCipher, SecretCipherError};
#[cfg(test)]
pub use vendor_gateway::MockVendorGateway;
pub use vendor_gateway::{VendorAccess, VendorExchange, VendorGateway, VendorGatewayError};
