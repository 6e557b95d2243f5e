//! TPC web service adapter.
//!
//! Implements the `VendorGateway` port over HTTPS.

mod dto;
mod http_gateway;

pub use http_gateway::TpcHttpGateway;
