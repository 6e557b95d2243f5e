//! AES-256-GCM secret cipher.
//!
//! Sealed format: `v1:` followed by standard base64 of `nonce || ciphertext`.
//! The nonce is 96 random bits per seal and the provider name is bound as
//! associated data.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::domain::ports::{SecretCipher, SecretCipherError};
use crate::domain::{Provider, SealedSecret};

const FORMAT_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Errors raised while loading a cipher key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherKeyError {
    /// Key text is not valid base64.
    #[error("cipher key is not valid base64: {message}")]
    Encoding { message: String },
    /// Key is not 32 bytes long.
    #[error("cipher key must be {KEY_LEN} bytes, got {length}")]
    Length { length: usize },
}

/// [`SecretCipher`] backed by AES-256-GCM.
#[derive(Clone)]
pub struct AesGcmSecretCipher {
    cipher: Aes256Gcm,
}

impl AesGcmSecretCipher {
    /// Load a key from standard base64.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CipherKeyError> {
        let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|err| {
            CipherKeyError::Encoding {
                message: err.to_string(),
            }
        })?);
        Self::from_key_bytes(&bytes)
    }

    /// Load a raw 32-byte key.
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, CipherKeyError> {
        if bytes.len() != KEY_LEN {
            return Err(CipherKeyError::Length {
                length: bytes.len(),
            });
        }
        let cipher = Aes256Gcm::new_from_slice(bytes).map_err(|_| CipherKeyError::Length {
            length: bytes.len(),
        })?;
        Ok(Self { cipher })
    }

    /// Generate a random key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }
}

impl fmt::Debug for AesGcmSecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesGcmSecretCipher(..)")
    }
}

impl SecretCipher for AesGcmSecretCipher {
    fn seal(&self, provider: &Provider, plaintext: &str) -> Result<SealedSecret, SecretCipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: provider.as_str().as_bytes(),
        };
        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload)
            .map_err(|_| SecretCipherError::seal("encryption failed"))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(SealedSecret::new(format!("{FORMAT_PREFIX}{}", STANDARD.encode(framed))))
    }

    fn open(
        &self,
        provider: &Provider,
        sealed: &SealedSecret,
    ) -> Result<Zeroizing<String>, SecretCipherError> {
        let encoded = sealed
            .expose_sealed()
            .strip_prefix(FORMAT_PREFIX)
            .ok_or_else(|| SecretCipherError::open("unknown sealed secret format"))?;
        let framed = STANDARD
            .decode(encoded)
            .map_err(|err| SecretCipherError::open(format!("sealed secret is not base64: {err}")))?;
        let (nonce, ciphertext) = framed
            .split_at_checked(NONCE_LEN)
            .ok_or_else(|| SecretCipherError::open("sealed secret is truncated"))?;
        let payload = Payload {
            msg: ciphertext,
            aad: provider.as_str().as_bytes(),
        };
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| SecretCipherError::open("authentication failed"))?,
        );
        String::from_utf8(plaintext.to_vec())
            .map(Zeroizing::new)
            .map_err(|_| SecretCipherError::open("secret is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn cipher() -> AesGcmSecretCipher {
        AesGcmSecretCipher::from_key_bytes(&[7_u8; KEY_LEN]).expect("key")
    }

    #[rstest]
    fn sealed_secrets_open_to_the_original(cipher: AesGcmSecretCipher) {
        let provider = Provider::tpc();
        let sealed = cipher.seal(&provider, "hunter2").expect("seal");

        assert!(sealed.expose_sealed().starts_with(FORMAT_PREFIX));
        assert!(!sealed.expose_sealed().contains("hunter2"));
        assert_eq!(cipher.open(&provider, &sealed).expect("open").as_str(), "hunter2");
    }

    #[rstest]
    fn sealing_twice_gives_different_text(cipher: AesGcmSecretCipher) {
        let provider = Provider::tpc();
        let first = cipher.seal(&provider, "same").expect("seal");
        let second = cipher.seal(&provider, "same").expect("seal");
        assert_ne!(first, second);
    }

    #[rstest]
    fn secrets_are_bound_to_their_provider(cipher: AesGcmSecretCipher) {
        let sealed = cipher.seal(&Provider::tpc(), "hunter2").expect("seal");
        let other = Provider::parse("dtdc").expect("provider");
        assert!(cipher.open(&other, &sealed).is_err());
    }

    #[rstest]
    fn other_keys_cannot_open(cipher: AesGcmSecretCipher) {
        let sealed = cipher.seal(&Provider::tpc(), "hunter2").expect("seal");
        assert!(AesGcmSecretCipher::ephemeral().open(&Provider::tpc(), &sealed).is_err());
    }

    #[rstest]
    #[case("aHVudGVyMg==")]
    #[case("v1:not base64!")]
    #[case("v1:AAAA")]
    fn malformed_sealed_text_is_rejected(cipher: AesGcmSecretCipher, #[case] raw: &str) {
        let sealed = SealedSecret::new(raw.to_owned());
        assert!(matches!(
            cipher.open(&Provider::tpc(), &sealed),
            Err(SecretCipherError::Open { .. })
        ));
    }

    #[rstest]
    #[case("", CipherKeyError::Length { length: 0 })]
    #[case("AAAA", CipherKeyError::Length { length: 3 })]
    fn short_keys_are_rejected(#[case] encoded: &str, #[case] expected: CipherKeyError) {
        assert_eq!(AesGcmSecretCipher::from_base64_key(encoded).err(), Some(expected));
    }

    #[test]
    fn base64_keys_are_accepted() {
        let encoded = STANDARD.encode([1_u8; KEY_LEN]);
        assert!(AesGcmSecretCipher::from_base64_key(&encoded).is_ok());
    }
}
