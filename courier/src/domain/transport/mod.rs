//! Courier transports: the live vendor-backed transport and the offline
//! simulation, behind one capability trait.
//!
//! Both variants validate input before doing anything else and write exactly
//! one audit record per logical call that reaches the vendor (or its
//! simulated stand-in). Calls run on a spawned task so the audit record is
//! written even if the caller stops waiting.

mod live;
mod simulation;

use std::future::Future;

use async_trait::async_trait;

use super::{ConsignmentNote, CourierError, LocalityMatch, ServiceabilityReport};

pub use live::{LiveCourierTransport, LiveTransportPorts};
pub use simulation::SimulationTransport;

/// Capability set shared by every courier transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourierTransport: Send + Sync {
    /// Check whether `pincode` is serviceable.
    async fn check_serviceability(&self, pincode: &str) -> Result<ServiceabilityReport, CourierError>;

    /// Find areas whose name or city contains `query`, case-insensitively.
    async fn search_locality(&self, query: &str) -> Result<Vec<LocalityMatch>, CourierError>;

    /// Request `quantity` consignment note numbers.
    async fn request_consignment_notes(&self, quantity: u32) -> Result<Vec<ConsignmentNote>, CourierError>;
}

/// Which transport variant is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Vendor-backed.
    Live,
    /// Offline stand-in.
    Simulation,
}

impl TransportMode {
    /// Stable lowercase label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Simulation => "simulation",
        }
    }
}

/// The transport chosen for the current credential state.
#[derive(Clone)]
pub enum ActiveTransport {
    /// Vendor-backed transport bound to the provider's active credential.
    Live(LiveCourierTransport),
    /// Offline stand-in.
    Simulation(SimulationTransport),
}

impl ActiveTransport {
    /// Variant tag.
    pub const fn mode(&self) -> TransportMode {
        match self {
            Self::Live(_) => TransportMode::Live,
            Self::Simulation(_) => TransportMode::Simulation,
        }
    }
}

impl std::fmt::Debug for ActiveTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ActiveTransport").field(&self.mode()).finish()
    }
}

#[async_trait]
impl CourierTransport for ActiveTransport {
    async fn check_serviceability(&self, pincode: &str) -> Result<ServiceabilityReport, CourierError> {
        match self {
            Self::Live(live) => live.check_serviceability(pincode).await,
            Self::Simulation(simulation) => simulation.check_serviceability(pincode).await,
        }
    }

    async fn search_locality(&self, query: &str) -> Result<Vec<LocalityMatch>, CourierError> {
        match self {
            Self::Live(live) => live.search_locality(query).await,
            Self::Simulation(simulation) => simulation.search_locality(query).await,
        }
    }

    async fn request_consignment_notes(&self, quantity: u32) -> Result<Vec<ConsignmentNote>, CourierError> {
        match self {
            Self::Live(live) => live.request_consignment_notes(quantity).await,
            Self::Simulation(simulation) => simulation.request_consignment_notes(quantity).await,
        }
    }
}

/// Source of the transport to use for the next call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransportSelector: Send + Sync {
    /// Pick a transport from the current credential state.
    async fn current_transport(&self) -> Result<ActiveTransport, CourierError>;
}

/// Run `call` on its own task so it finishes even if the caller is dropped.
async fn run_detached<T, F>(call: F) -> Result<T, CourierError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, CourierError>> + Send + 'static,
{
    tokio::spawn(call).await?
}
