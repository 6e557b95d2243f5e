//! Courier integration client.
//!
//! The crate talks to a third-party logistics vendor to check pincode
//! serviceability, resolve locality names to pincodes, and allocate
//! consignment notes for dispatch. It is laid out as a hexagon:
//!
//! - [`domain`] owns the types, services, and ports (traits) the services
//!   depend on.
//! - [`outbound`] holds the driven adapters: the reqwest vendor gateway,
//!   in-memory and JSON-lines stores, and the AES-GCM secret cipher.
//! - [`bootstrap`] wires adapters into ready-to-use services from
//!   [`config::CourierSettings`].

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
