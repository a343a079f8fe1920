//! Configuration rows and the bulk source that supplies them.
//!
//! The relational client behind [`ConfigSource`] is an external
//! collaborator; the engine only consumes the three row sets it returns.
//! Absent optional columns take their documented defaults: strip 0,
//! weight 1, transport udp, no port.

use serde::{Deserialize, Serialize};

use crate::domain::gateway::{Scheme, Transport};
use crate::error::ConfigError;

/// One row of the gateway table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRow {
    /// Unique numeric gateway ID.
    pub id: u32,
    /// Address or hostname.
    pub host: String,
    /// Port; `None` leaves the port out of emitted URIs.
    #[serde(default)]
    pub port: Option<u16>,
    /// URI scheme; defaults to `sip`.
    #[serde(default = "default_scheme")]
    pub scheme: Scheme,
    /// Transport; defaults to udp.
    #[serde(default)]
    pub transport: Transport,
    /// Digits stripped from the caller user part; defaults to 0.
    #[serde(default)]
    pub strip: usize,
    /// Prefix prepended to the caller user part; defaults to empty.
    #[serde(default)]
    pub prefix: String,
    /// Default selection weight; defaults to 1.
    #[serde(default = "default_weight")]
    pub weight: u16,
    /// Grouping ID; defaults to 0.
    #[serde(default)]
    pub group: u32,
    /// Free-form operator flags; defaults to 0.
    #[serde(default)]
    pub flags: u32,
}

fn default_scheme() -> Scheme {
    Scheme::Sip
}

fn default_weight() -> u16 {
    1
}

/// One row of the routing-rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRow {
    /// Unique numeric rule ID, referenced by target rows.
    pub id: u32,
    /// Literal prefix; empty means catch-all.
    #[serde(default)]
    pub prefix: String,
    /// Optional caller-URI pattern.
    #[serde(default)]
    pub caller_pattern: Option<String>,
    /// Optional request-URI pattern.
    #[serde(default)]
    pub request_pattern: Option<String>,
    /// Halt evaluation of shorter prefixes once this rule matches.
    #[serde(default)]
    pub stopper: bool,
    /// Routing group the rule belongs to; defaults to 0.
    #[serde(default)]
    pub group: u32,
    /// Disabled rules are skipped during the snapshot build.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One row of the rule-target table tying a rule to a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRow {
    /// Rule the target belongs to.
    pub rule_id: u32,
    /// Gateway the target points at.
    pub gateway_id: u32,
    /// Priority tier; lower is preferred. Defaults to 0.
    #[serde(default)]
    pub priority: u8,
    /// Weight override; `None` falls back to the gateway's default weight.
    #[serde(default)]
    pub weight: Option<u16>,
}

/// The three row sets one reload consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigRows {
    /// Gateway table rows.
    pub gateways: Vec<GatewayRow>,
    /// Rule table rows.
    pub rules: Vec<RuleRow>,
    /// Rule-target table rows.
    pub targets: Vec<TargetRow>,
}

/// Bulk reader that supplies configuration rows for a reload.
pub trait ConfigSource: Send + Sync {
    /// Fetch a fresh, complete set of rows.
    fn load(&self) -> Result<ConfigRows, ConfigError>;
}

/// Upper bounds on table sizes; exceeding one aborts the reload.
#[derive(Debug, Clone, Copy)]
pub struct CapacityLimits {
    /// Maximum number of gateway rows.
    pub max_gateways: usize,
    /// Maximum number of rule rows.
    pub max_rules: usize,
    /// Maximum number of target rows.
    pub max_targets: usize,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            max_gateways: 1024,
            max_rules: 8192,
            max_targets: 16384,
        }
    }
}
