//! Error taxonomy for the routing engine.
//!
//! Reload-path problems ([`ConfigError`]) abort the reload and leave the
//! previously published snapshot in place; they never affect in-flight
//! routing. A routing miss is not an error at all, just an empty candidate
//! set. [`StructuralError`] indicates a corrupted published snapshot and is
//! treated as fatal misconfiguration by the caller.

use thiserror::Error;

/// A malformed or out-of-range configuration row, or a capacity overrun,
/// detected while building a snapshot. The reload that hit it is aborted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A gateway or target weight outside the valid `1..=254` range.
    #[error("weight {weight} of gateway {gateway} is out of range 1..=254")]
    WeightOutOfRange {
        /// Gateway the weight belongs to.
        gateway: u32,
        /// The offending weight value.
        weight: u16,
    },

    /// Two gateways share the same numeric ID.
    #[error("gateway id {0} is not unique")]
    DuplicateGatewayId(u32),

    /// Two gateways in one group share the same host, making selection
    /// dedup ambiguous.
    #[error("host/group <{host}/{group}> of gateway is not unique")]
    DuplicateGatewayHost {
        /// The duplicated host.
        host: String,
        /// The group both gateways belong to.
        group: u32,
    },

    /// A rule target references a gateway ID that is not in the gateway
    /// table.
    #[error("target of rule {rule} references unknown gateway {gateway}")]
    DanglingTarget {
        /// Rule row ID carrying the target.
        rule: u32,
        /// The unknown gateway ID.
        gateway: u32,
    },

    /// A target row references a rule ID that is not in the rule table.
    #[error("target references unknown rule {0}")]
    DanglingRule(u32),

    /// An enabled rule ended up with no targets.
    #[error("rule {0} has no targets")]
    EmptyTargets(u32),

    /// A caller or request pattern failed to compile.
    #[error("invalid {kind} pattern on rule {rule}: {source}")]
    Pattern {
        /// Which pattern column was malformed (`caller` or `request`).
        kind: &'static str,
        /// Rule row ID carrying the pattern.
        rule: u32,
        /// The underlying regex compile error.
        source: regex::Error,
    },

    /// A table exceeded its configured capacity.
    #[error("{what} count {count} exceeds capacity {limit}")]
    CapacityExceeded {
        /// Which table overran (`gateways`, `rules`, or `targets`).
        what: &'static str,
        /// Observed row count.
        count: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Another reload is already running; reloads are linearized, never
    /// interleaved.
    #[error("a reload is already in progress")]
    ReloadInProgress,

    /// The configuration source failed to deliver rows.
    #[error("configuration source failed: {0}")]
    Source(String),
}

/// A dangling reference inside a published snapshot.
///
/// This cannot be produced by a validated reload; seeing it means a
/// build-time bug and should trip an alarm rather than degrade silently.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("target references gateway index {index} outside registry of {registry_len} entries")]
pub struct StructuralError {
    /// The out-of-bounds registry index.
    pub index: usize,
    /// Number of gateways actually in the registry.
    pub registry_len: usize,
}
