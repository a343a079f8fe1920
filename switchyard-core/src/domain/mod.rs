//! Domain models for gateways and routing rules.

pub mod gateway;
pub mod rule;

pub use gateway::{Gateway, GatewayHealth, GatewayId, HealthState, Scheme, Transport};
pub use rule::{RoutingRule, Target};

/// Current wall-clock time as unix seconds, the time base for defunct
/// expiry checks.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
