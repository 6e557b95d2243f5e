//! Outbound adapters implementing the domain ports.

mod aes_gcm_cipher;
mod jsonl_audit_log;
pub mod memory;
pub mod tpc;

pub use aes_gcm_cipher::{AesGcmSecretCipher, CipherKeyError};
pub use jsonl_audit_log::JsonlAuditLog;
