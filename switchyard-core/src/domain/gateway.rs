//! Outbound gateway models and per-gateway health state.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A unique identifier for an outbound gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GatewayId(pub u32);

impl std::fmt::Display for GatewayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URI scheme a gateway is addressed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain `sip:` URIs.
    Sip,
    /// TLS-secured `sips:` URIs.
    Sips,
}

impl Scheme {
    /// The scheme name without the trailing colon.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        }
    }
}

/// Transport protocol used to reach a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// UDP, the default; emitted URIs carry no transport parameter.
    #[default]
    Udp,
    /// TCP.
    Tcp,
    /// TLS.
    Tls,
    /// SCTP.
    Sctp,
}

impl Transport {
    /// The URI `;transport=` parameter for this transport, or `None` for
    /// the UDP default which is left implicit.
    pub fn uri_param(&self) -> Option<&'static str> {
        match self {
            Transport::Udp => None,
            Transport::Tcp => Some(";transport=tcp"),
            Transport::Tls => Some(";transport=tls"),
            Transport::Sctp => Some(";transport=sctp"),
        }
    }
}

/// Probe-driven health state of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Receiving traffic normally.
    Active,
    /// Accumulating failures but still eligible for selection; the inner
    /// value is the number of further failures tolerated before the
    /// gateway goes inactive.
    Suspect(u8),
    /// Excluded from selection until a probe succeeds.
    Inactive,
}

// Health state is packed into one atomic word so routing reads and
// failure reports never take a lock: low byte = remaining tolerated
// failures, next byte = state code.
const STATE_ACTIVE: u32 = 0;
const STATE_SUSPECT: u32 = 1;
const STATE_INACTIVE: u32 = 2;
const STATE_SHIFT: u32 = 8;
const REMAINING_MASK: u32 = 0xff;

/// Lock-free runtime health of one gateway.
///
/// These fields are the only mutable state inside a published snapshot.
#[derive(Debug)]
pub struct GatewayHealth {
    packed: AtomicU32,
    /// Unix seconds until which the gateway is administratively defunct;
    /// zero means no defunct window is set.
    defunct_until: AtomicU64,
}

impl Default for GatewayHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayHealth {
    /// A fresh health record in the `Active` state.
    pub fn new() -> Self {
        Self {
            packed: AtomicU32::new(STATE_ACTIVE << STATE_SHIFT),
            defunct_until: AtomicU64::new(0),
        }
    }

    fn unpack(packed: u32) -> HealthState {
        match packed >> STATE_SHIFT {
            STATE_SUSPECT => HealthState::Suspect((packed & REMAINING_MASK) as u8),
            STATE_INACTIVE => HealthState::Inactive,
            _ => HealthState::Active,
        }
    }

    /// Current probe-driven state.
    pub fn state(&self) -> HealthState {
        Self::unpack(self.packed.load(Ordering::Acquire))
    }

    /// Record a dispatch-layer failure report.
    ///
    /// An `Active` gateway becomes `Suspect` seeded with `threshold - 1`
    /// remaining tolerated failures; each further failure decrements the
    /// counter and the gateway goes `Inactive` when it runs out. Returns
    /// the state after the transition.
    pub fn report_failure(&self, threshold: u8) -> HealthState {
        let mut current = self.packed.load(Ordering::Acquire);
        loop {
            let next = match Self::unpack(current) {
                HealthState::Active => {
                    if threshold <= 1 {
                        STATE_INACTIVE << STATE_SHIFT
                    } else {
                        (STATE_SUSPECT << STATE_SHIFT) | u32::from(threshold - 1)
                    }
                }
                HealthState::Suspect(remaining) => {
                    if remaining <= 1 {
                        STATE_INACTIVE << STATE_SHIFT
                    } else {
                        (STATE_SUSPECT << STATE_SHIFT) | u32::from(remaining - 1)
                    }
                }
                HealthState::Inactive => STATE_INACTIVE << STATE_SHIFT,
            };
            match self.packed.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Self::unpack(next),
                Err(updated) => current = updated,
            }
        }
    }

    /// Record a successful liveness probe, restoring `Active` from any
    /// probe-driven state.
    pub fn report_success(&self) {
        self.packed
            .store(STATE_ACTIVE << STATE_SHIFT, Ordering::Release);
    }

    /// Mark the gateway defunct until the given unix-seconds timestamp.
    pub fn set_defunct_until(&self, until: u64) {
        self.defunct_until.store(until, Ordering::Release);
    }

    /// Unix-seconds timestamp the current defunct window expires at, or
    /// zero when none is set.
    pub fn defunct_until(&self) -> u64 {
        self.defunct_until.load(Ordering::Acquire)
    }

    /// Whether the gateway is inside an unexpired defunct window.
    pub fn is_defunct(&self, now: u64) -> bool {
        now < self.defunct_until.load(Ordering::Acquire)
    }

    /// Whether the selector may emit this gateway: neither `Inactive` nor
    /// inside a defunct window. `Suspect` gateways stay eligible.
    pub fn is_selectable(&self, now: u64) -> bool {
        !self.is_defunct(now) && self.state() != HealthState::Inactive
    }
}

/// One outbound gateway as loaded from configuration.
///
/// Everything except [`GatewayHealth`] is immutable once the owning
/// snapshot is published; gateways are replaced wholesale on reload.
#[derive(Debug)]
pub struct Gateway {
    /// The unique numeric ID of the gateway.
    pub id: GatewayId,
    /// Address or hostname.
    pub host: String,
    /// Port, if configured; URIs omit the port when absent.
    pub port: Option<u16>,
    /// URI scheme the gateway is addressed with.
    pub scheme: Scheme,
    /// Transport protocol towards the gateway.
    pub transport: Transport,
    /// Number of leading characters stripped from the caller user part.
    pub strip: usize,
    /// Literal prefix prepended to the (stripped) caller user part.
    pub prefix: String,
    /// Default weight for weighted selection, in `1..=254`.
    pub weight: u16,
    /// Grouping ID the gateway belongs to.
    pub group: u32,
    /// Free-form operator flags, passed through untouched.
    pub flags: u32,
    /// Runtime health state; the only mutable part of a published gateway.
    pub health: GatewayHealth,
}

impl Gateway {
    /// The URI a liveness probe for this gateway is sent to, which is also
    /// the correlation key for the asynchronous probe reply.
    pub fn probe_uri(&self) -> String {
        let mut uri = format!("{}:{}", self.scheme.as_str(), self.host);
        if let Some(port) = self.port {
            uri.push(':');
            uri.push_str(&port.to_string());
        }
        if let Some(param) = self.transport.uri_param() {
            uri.push_str(param);
        }
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_failures_reach_inactive_under_threshold_three() {
        let h = GatewayHealth::new();
        assert_eq!(h.report_failure(3), HealthState::Suspect(2));
        assert_eq!(h.report_failure(3), HealthState::Suspect(1));
        assert_eq!(h.report_failure(3), HealthState::Inactive);
        // Further failures are absorbed.
        assert_eq!(h.report_failure(3), HealthState::Inactive);
    }

    #[test]
    fn probe_success_restores_active_from_any_state() {
        let h = GatewayHealth::new();
        h.report_failure(2);
        h.report_success();
        assert_eq!(h.state(), HealthState::Active);

        h.report_failure(1);
        assert_eq!(h.state(), HealthState::Inactive);
        h.report_success();
        assert_eq!(h.state(), HealthState::Active);
    }

    #[test]
    fn suspect_remains_selectable_inactive_does_not() {
        let h = GatewayHealth::new();
        h.report_failure(3);
        assert!(h.is_selectable(100));
        h.report_failure(3);
        h.report_failure(3);
        assert!(!h.is_selectable(100));
    }

    #[test]
    fn defunct_window_is_independent_of_probe_state() {
        let h = GatewayHealth::new();
        h.set_defunct_until(200);
        assert!(!h.is_selectable(199));
        // Expires exactly at the stored timestamp.
        assert!(h.is_selectable(200));
        assert_eq!(h.state(), HealthState::Active);
    }

    #[test]
    fn probe_uri_includes_port_and_transport() {
        let gw = Gateway {
            id: GatewayId(7),
            host: "gw.example.com".into(),
            port: Some(5061),
            scheme: Scheme::Sips,
            transport: Transport::Tls,
            strip: 0,
            prefix: String::new(),
            weight: 1,
            group: 0,
            flags: 0,
            health: GatewayHealth::new(),
        };
        assert_eq!(gw.probe_uri(), "sips:gw.example.com:5061;transport=tls");
    }
}
