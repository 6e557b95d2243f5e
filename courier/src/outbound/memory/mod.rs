//! Process-local adapters backed by standard-library locks.
//!
//! They are the default storage for the CLI and the backbone of the test
//! harness. Poisoned locks surface as backend errors rather than panics.

mod audit_log;
mod consignment_batches;
mod credentials;
mod notifications;

pub use audit_log::InMemoryAuditLog;
pub use consignment_batches::InMemoryConsignmentBatches;
pub use credentials::InMemoryCredentials;
pub use notifications::RecordingAdminNotifier;

fn poisoned(resource: &str) -> String {
    format!("{resource} lock poisoned")
}
