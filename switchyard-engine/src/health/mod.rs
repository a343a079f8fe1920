//! Gateway health monitoring.
//!
//! Dispatch-layer failure reports drive gateways through
//! `Active -> Suspect -> Inactive`; a background prober periodically sends
//! liveness probes to every watched gateway and a successful reply,
//! correlated asynchronously by its target URI, restores `Active`.

pub mod monitor;
pub mod prober;

pub use monitor::{HealthConfig, HealthMonitor};
pub use prober::{spawn_prober, ProbeTransport};
