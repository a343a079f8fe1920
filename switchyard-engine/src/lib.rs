//! Switchyard engine.
//!
//! The async side of the routing engine: the health monitor with its
//! periodic probe task, the reload service feeding the snapshot store, and
//! the call-control facade that turns a request into a dispatch token.

pub mod health;
pub mod reload;
pub mod router;

pub use health::{spawn_prober, HealthConfig, HealthMonitor, ProbeTransport};
pub use reload::ReloadService;
pub use router::{RouteError, Router};
