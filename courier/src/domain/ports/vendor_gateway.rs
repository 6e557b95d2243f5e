//! Driven port for the courier vendor's HTTP API.
//!
//! The domain owns the request and result shapes; adapters own URLs, wire
//! formats, and payload normalisation. Every successful exchange carries the
//! raw body so callers can audit exactly what the vendor said.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::{
    ConsignmentNote, ConsignmentQuantity, LocalityMatch, LocalityQuery, Pincode,
    ServiceabilityReport,
};

/// Decrypted vendor access for one logical call.
#[derive(Clone)]
pub struct VendorAccess {
    /// Vendor API base URL.
    pub base_url: Url,
    /// Vendor account name.
    pub username: String,
    /// Vendor password.
    pub password: Zeroizing<String>,
}

impl fmt::Debug for VendorAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorAccess")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Typed vendor result paired with the body it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorExchange<T> {
    /// Normalised value.
    pub value: T,
    /// Response body exactly as received.
    pub raw_response: String,
}

/// Errors surfaced while calling the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VendorGatewayError {
    /// Network transport failed before a response arrived.
    #[error("vendor transport failed: {message}")]
    Transport { message: String },
    /// The attempt exceeded its timeout.
    #[error("vendor call timed out: {message}")]
    Timeout { message: String },
    /// The vendor throttled the request.
    #[error("vendor rate limited request: {message}")]
    RateLimited { message: String },
    /// The vendor answered but refused the request.
    #[error("vendor rejected request: {message}")]
    Rejected {
        message: String,
        raw_response: String,
    },
    /// The vendor answered with something that could not be interpreted.
    #[error("vendor response could not be decoded: {message}")]
    Decode {
        message: String,
        raw_response: String,
    },
    /// The adapter could not build the request.
    #[error("vendor request invalid: {message}")]
    InvalidRequest { message: String },
}

impl VendorGatewayError {
    /// Helper for transport failures.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Helper for timeouts.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Helper for throttling.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Helper for business rejections.
    pub fn rejected(message: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    /// Helper for undecodable bodies.
    pub fn decode(message: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    /// Helper for requests the adapter could not build.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Return whether retrying this error is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Body received from the vendor, when there was one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Rejected { raw_response, .. } | Self::Decode { raw_response, .. } => {
                Some(raw_response.as_str())
            }
            _ => None,
        }
    }
}

/// Port for the vendor's three business endpoints.
///
/// One call is one network attempt; retries belong to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VendorGateway: Send + Sync {
    /// Check whether `pincode` is serviceable.
    async fn pincode_service(
        &self,
        access: &VendorAccess,
        pincode: &Pincode,
    ) -> Result<VendorExchange<ServiceabilityReport>, VendorGatewayError>;

    /// Find areas whose name matches `query`.
    async fn locality_search(
        &self,
        access: &VendorAccess,
        query: &LocalityQuery,
    ) -> Result<VendorExchange<Vec<LocalityMatch>>, VendorGatewayError>;

    /// Request `quantity` fresh consignment note numbers.
    async fn consignment_notes(
        &self,
        access: &VendorAccess,
        quantity: ConsignmentQuantity,
    ) -> Result<VendorExchange<Vec<ConsignmentNote>>, VendorGatewayError>;
}
