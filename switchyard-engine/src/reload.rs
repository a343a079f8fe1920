//! Live reconfiguration: fetch rows, build off to the side, publish.

use std::sync::Arc;

use tracing::{error, info};

use switchyard_core::snapshot::build_snapshot;
use switchyard_core::{CapacityLimits, ConfigError, ConfigSource, SnapshotStore};

/// Drives reloads from a configuration source into a snapshot store.
///
/// A reload that fails validation aborts without touching the published
/// snapshot; concurrent reload attempts are rejected by the store.
pub struct ReloadService<S: ConfigSource> {
    store: Arc<SnapshotStore>,
    source: S,
    limits: CapacityLimits,
}

impl<S: ConfigSource> ReloadService<S> {
    /// Create a reload service over the given store and row source.
    pub fn new(store: Arc<SnapshotStore>, source: S, limits: CapacityLimits) -> Self {
        Self {
            store,
            source,
            limits,
        }
    }

    /// Fetch fresh rows, build and validate a new snapshot, and publish
    /// it. Returns the new generation number.
    pub fn reload(&self) -> Result<u64, ConfigError> {
        let rows = self.source.load()?;
        let generation = self.store.generation() + 1;
        let snapshot = build_snapshot(&rows, &self.limits, generation).inspect_err(|err| {
            error!(%err, "reload aborted, keeping previous snapshot");
        })?;
        self.store.publish(snapshot)?;
        info!(generation, "reload complete");
        Ok(generation)
    }
}
