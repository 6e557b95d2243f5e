//! Error taxonomy shared by every courier operation.
//!
//! Callers branch on the variant: validation and configuration failures are
//! fast-fail and never reach the network, transport failures have already been
//! retried, and vendor failures carry the raw payload for diagnosis.

use thiserror::Error;
use tokio::task::JoinError;

/// Failure surfaced by courier transports and the services built on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CourierError {
    /// Input was malformed; no network call was made.
    #[error("invalid courier request: {message}")]
    Validation { message: String },
    /// No usable active credential; no network call was made.
    #[error("courier configuration unusable: {message}")]
    Config { message: String },
    /// Network failure or timeout that persisted across every attempt.
    #[error("courier transport failed after {attempts} attempt(s): {message}")]
    Transport { message: String, attempts: u32 },
    /// Well-formed vendor response signalling a business rejection.
    #[error("courier vendor rejected request: {message}")]
    Vendor {
        message: String,
        raw_response: String,
    },
    /// Task or shared-state failure inside the client itself.
    #[error("courier client internal failure: {message}")]
    Internal { message: String },
}

impl CourierError {
    /// Helper for malformed input.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Helper for missing or unusable credentials.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Helper for exhausted transport retries.
    pub fn transport(message: impl Into<String>, attempts: u32) -> Self {
        Self::Transport {
            message: message.into(),
            attempts,
        }
    }

    /// Helper for vendor business rejections.
    pub fn vendor(message: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self::Vendor {
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    /// Helper for internal failures.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Raw vendor payload attached to [`CourierError::Vendor`].
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Vendor { raw_response, .. } => Some(raw_response.as_str()),
            _ => None,
        }
    }

    /// Whether the failure happened before any network activity.
    pub const fn is_fast_fail(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Config { .. })
    }
}

impl From<JoinError> for CourierError {
    fn from(error: JoinError) -> Self {
        Self::internal(format!("courier task did not complete: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::validation(CourierError::validation("bad pincode"), true)]
    #[case::config(CourierError::config("no credential"), true)]
    #[case::transport(CourierError::transport("timeout", 3), false)]
    #[case::vendor(CourierError::vendor("stock empty", "{}"), false)]
    fn fast_fail_covers_pre_network_failures(#[case] error: CourierError, #[case] expected: bool) {
        assert_eq!(error.is_fast_fail(), expected);
    }

    #[test]
    fn vendor_errors_expose_raw_payload() {
        let error = CourierError::vendor("rejected", r#"{"MESSAGE":"no stock"}"#);
        assert_eq!(error.raw_response(), Some(r#"{"MESSAGE":"no stock"}"#));
        assert!(CourierError::transport("reset", 2).raw_response().is_none());
    }

    #[test]
    fn transport_message_reports_attempts() {
        let error = CourierError::transport("connection reset", 3);
        assert_eq!(
            error.to_string(),
            "courier transport failed after 3 attempt(s): connection reset"
        );
    }
}
