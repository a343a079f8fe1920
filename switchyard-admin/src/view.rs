//! Serializable read-only views of the published configuration.

use serde::Serialize;

use switchyard_core::domain::gateway::{Gateway, GatewayId, HealthState, Scheme, Transport};
use switchyard_core::domain::rule::RoutingRule;

/// Diagnostic view of one gateway, including its runtime health.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayView {
    /// Gateway ID.
    pub id: GatewayId,
    /// Grouping ID.
    pub group: u32,
    /// Address or hostname.
    pub host: String,
    /// Port, if configured.
    pub port: Option<u16>,
    /// URI scheme.
    pub scheme: Scheme,
    /// Transport protocol.
    pub transport: Transport,
    /// Strip count applied to the user part.
    pub strip: usize,
    /// Prefix prepended to the user part.
    pub prefix: String,
    /// Default selection weight.
    pub weight: u16,
    /// Operator flags.
    pub flags: u32,
    /// Probe-driven health state at dump time.
    pub health: HealthState,
    /// Defunct-window expiry (unix seconds), if one is set.
    pub defunct_until: Option<u64>,
}

impl From<&Gateway> for GatewayView {
    fn from(gw: &Gateway) -> Self {
        let defunct_until = gw.health.defunct_until();
        Self {
            id: gw.id,
            group: gw.group,
            host: gw.host.clone(),
            port: gw.port,
            scheme: gw.scheme,
            transport: gw.transport,
            strip: gw.strip,
            prefix: gw.prefix.clone(),
            weight: gw.weight,
            flags: gw.flags,
            health: gw.health.state(),
            defunct_until: (defunct_until > 0).then_some(defunct_until),
        }
    }
}

/// Diagnostic view of one target of a rule.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    /// Gateway the target points at.
    pub gateway_id: GatewayId,
    /// Priority tier.
    pub priority: u8,
    /// Effective weight.
    pub weight: u16,
}

/// Diagnostic view of one routing rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleView {
    /// Literal prefix; empty means catch-all.
    pub prefix: String,
    /// Caller-URI pattern, if any.
    pub caller_pattern: Option<String>,
    /// Request-URI pattern, if any.
    pub request_pattern: Option<String>,
    /// Whether the rule halts shorter-prefix evaluation.
    pub stopper: bool,
    /// Routing group.
    pub group: u32,
    /// The rule's targets.
    pub targets: Vec<TargetView>,
}

impl RuleView {
    /// Build the view, resolving target registry indexes back to IDs.
    pub fn new(rule: &RoutingRule, gateways: &[Gateway]) -> Self {
        Self {
            prefix: rule.prefix.clone(),
            caller_pattern: rule.caller_pattern.as_ref().map(|re| re.as_str().into()),
            request_pattern: rule.request_pattern.as_ref().map(|re| re.as_str().into()),
            stopper: rule.stopper,
            group: rule.group,
            targets: rule
                .targets
                .iter()
                .map(|t| TargetView {
                    gateway_id: gateways[t.gateway].id,
                    priority: t.priority,
                    weight: t.weight,
                })
                .collect(),
        }
    }
}
