//! Port for sealing credential secrets at rest.

use thiserror::Error;
use zeroize::Zeroizing;

use crate::domain::{Provider, SealedSecret};

/// Errors raised while sealing or opening a secret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretCipherError {
    /// Encryption failed.
    #[error("secret could not be sealed: {message}")]
    Seal { message: String },
    /// Decryption failed: wrong key, tampered text, or unknown format.
    #[error("secret could not be opened: {message}")]
    Open { message: String },
}

impl SecretCipherError {
    /// Helper for encryption failures.
    pub fn seal(message: impl Into<String>) -> Self {
        Self::Seal {
            message: message.into(),
        }
    }

    /// Helper for decryption failures.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }
}

/// Reversible, authenticated secret encryption.
///
/// The provider is bound to the sealed text so a secret cannot be moved
/// between providers.
#[cfg_attr(test, mockall::automock)]
pub trait SecretCipher: Send + Sync {
    /// Encrypt `plaintext`.
    fn seal(&self, provider: &Provider, plaintext: &str) -> Result<SealedSecret, SecretCipherError>;

    /// Decrypt `sealed`.
    fn open(
        &self,
        provider: &Provider,
        sealed: &SealedSecret,
    ) -> Result<Zeroizing<String>, SecretCipherError>;
}
