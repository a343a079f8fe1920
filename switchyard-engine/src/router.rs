//! The call-control facade: one request in, one dispatch token out.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use switchyard_core::domain::unix_now;
use switchyard_core::{
    resolve, select, GatewayId, HealthState, RouteInput, SelectionToken, SnapshotStore,
    StructuralError,
};

use crate::health::monitor::HealthMonitor;

/// Failure modes of [`Router::route_request`].
///
/// A routing miss is not among them; it yields an empty token and the
/// call-control layer decides the user-visible outcome.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The published snapshot is corrupt; fatal misconfiguration.
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Resolves, selects, and encodes within a single snapshot generation.
pub struct Router {
    store: Arc<SnapshotStore>,
    monitor: Arc<HealthMonitor>,
}

impl Router {
    /// Create a router over the given store and health monitor.
    pub fn new(store: Arc<SnapshotStore>, monitor: Arc<HealthMonitor>) -> Self {
        Self { store, monitor }
    }

    /// Resolve the request to an ordered fallback sequence of gateway
    /// destinations.
    ///
    /// The snapshot handle acquired here is scoped to this call, so the
    /// whole resolution observes exactly one generation and its release
    /// never leaks, even on early return. A routing miss returns an empty
    /// token.
    pub fn route_request(&self, input: &RouteInput<'_>) -> Result<SelectionToken, RouteError> {
        let snapshot = self.store.acquire();

        let candidates = resolve(&snapshot, input)?;
        if candidates.is_empty() {
            debug!(user = input.request_user, group = input.group, "routing miss");
            return Ok(SelectionToken::empty());
        }

        let ordered = select(&snapshot, &candidates, unix_now());
        let gateways = ordered.iter().map(|&index| &snapshot.gateways()[index]);
        Ok(SelectionToken::encode(gateways, input.request_user))
    }

    /// Dispatch-layer hook: report that sending to a gateway failed.
    pub fn report_failure(&self, id: GatewayId) -> Option<HealthState> {
        self.monitor.report_failure(id)
    }
}
