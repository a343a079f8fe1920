//! Switchyard core functionality.
//!
//! This crate contains the domain models, snapshot store, and routing primitives
//! that power the Switchyard gateway-routing engine: longest-prefix-match rule
//! lookup, weighted priority-tiered gateway selection, and the hot-swappable
//! configuration snapshot protocol.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod routing;
pub mod snapshot;

pub use config::{CapacityLimits, ConfigRows, ConfigSource};
pub use dispatch::{Destination, SelectionToken};
pub use domain::gateway::{Gateway, GatewayId, HealthState};
pub use error::{ConfigError, StructuralError};
pub use routing::{resolve, select, Candidate, RouteInput};
pub use snapshot::{Snapshot, SnapshotHandle, SnapshotStore};
