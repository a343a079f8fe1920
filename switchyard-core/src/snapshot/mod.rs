//! Immutable configuration snapshots and their hot-swap store.

pub mod builder;
pub mod store;

use std::collections::HashMap;

use crate::domain::gateway::{Gateway, GatewayId};
use crate::domain::rule::RoutingRule;

pub use builder::build_snapshot;
pub use store::{SnapshotHandle, SnapshotStore};

/// Prefix-bucketed index over the rules of one snapshot.
///
/// Buckets are keyed by the literal prefix bytes; the descending list of
/// distinct prefix lengths drives longest-prefix-first lookup and is
/// precomputed at build time. Catch-all rules (empty prefix) live in a
/// separate bucket consulted only when no literal prefix matched.
#[derive(Debug, Default)]
pub struct RuleIndex {
    buckets: HashMap<Vec<u8>, Vec<usize>>,
    lengths: Vec<usize>,
    catch_all: Vec<usize>,
}

impl RuleIndex {
    /// Distinct non-zero prefix lengths present, longest first.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Rule indexes bucketed under the given literal prefix.
    pub fn bucket(&self, prefix: &[u8]) -> Option<&[usize]> {
        self.buckets.get(prefix).map(Vec::as_slice)
    }

    /// Rule indexes of the catch-all (empty-prefix) rules.
    pub fn catch_all(&self) -> &[usize] {
        &self.catch_all
    }
}

/// One immutable, fully-consistent generation of the routing configuration:
/// the gateway registry paired with the rule index.
///
/// Once published through a [`SnapshotStore`], a snapshot is never mutated
/// except for the per-gateway atomic health fields; it is freed when the
/// last handle referencing it is dropped.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    gateways: Vec<Gateway>,
    by_id: HashMap<GatewayId, usize>,
    rules: Vec<RoutingRule>,
    index: RuleIndex,
}

impl Snapshot {
    /// An empty generation-zero snapshot, the store's initial contents.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            gateways: Vec::new(),
            by_id: HashMap::new(),
            rules: Vec::new(),
            index: RuleIndex::default(),
        }
    }

    /// Generation counter assigned when the snapshot was built.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The gateway registry.
    pub fn gateways(&self) -> &[Gateway] {
        &self.gateways
    }

    /// The rule table.
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// The prefix index over the rule table.
    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    /// O(1) gateway lookup by ID.
    pub fn gateway_by_id(&self, id: GatewayId) -> Option<&Gateway> {
        self.by_id.get(&id).map(|&i| &self.gateways[i])
    }
}
