//! The health monitor: failure accounting, defunct windows, and probe
//! correlation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use switchyard_core::domain::unix_now;
use switchyard_core::{GatewayId, HealthState, SnapshotStore};

use crate::health::prober::ProbeTransport;

/// Tunables for the health state machine and probe cycle.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Consecutive failures tolerated before a gateway goes inactive.
    pub failure_threshold: u8,
    /// How often the prober sweeps watched gateways.
    pub probe_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            probe_interval: Duration::from_secs(30),
        }
    }
}

/// Tracks gateway health across reloads and correlates out-of-band probe
/// replies with the gateways they were sent to.
#[derive(Debug)]
pub struct HealthMonitor {
    store: Arc<SnapshotStore>,
    config: HealthConfig,
    /// Probes awaiting a reply, keyed by target URI. Gateways in different
    /// groups may share an address, so one URI can cover several gateways.
    inflight: DashMap<String, Vec<GatewayId>>,
}

impl HealthMonitor {
    /// Create a monitor over the given snapshot store.
    pub fn new(store: Arc<SnapshotStore>, config: HealthConfig) -> Self {
        Self {
            store,
            config,
            inflight: DashMap::new(),
        }
    }

    /// The monitor's configuration.
    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Record a dispatch-layer failure against a gateway.
    ///
    /// Returns the state after the transition, or `None` if the gateway is
    /// not in the current snapshot (it may have been dropped by a reload
    /// while the request was in flight, which is harmless).
    pub fn report_failure(&self, id: GatewayId) -> Option<HealthState> {
        let snapshot = self.store.acquire();
        let gateway = snapshot.gateway_by_id(id)?;
        let state = gateway.health.report_failure(self.config.failure_threshold);
        match state {
            HealthState::Inactive => {
                warn!(gateway = %id, "gateway went inactive after repeated failures");
            }
            HealthState::Suspect(remaining) => {
                debug!(gateway = %id, remaining, "gateway under suspicion");
            }
            HealthState::Active => {}
        }
        Some(state)
    }

    /// Administratively exclude a gateway from selection for `seconds`
    /// from now. The window expires on its own; probe state is unaffected.
    pub fn mark_defunct(&self, id: GatewayId, seconds: u64) -> Option<u64> {
        let snapshot = self.store.acquire();
        let gateway = snapshot.gateway_by_id(id)?;
        let until = unix_now() + seconds;
        gateway.health.set_defunct_until(until);
        info!(gateway = %id, until, "gateway marked defunct");
        Some(until)
    }

    /// Handle an asynchronous probe reply, matched by the probe's target
    /// URI. Unmatched replies are ignored.
    pub fn on_probe_result(&self, success: bool, uri: &str) {
        let Some((_, ids)) = self.inflight.remove(uri) else {
            debug!(uri, "probe reply with no in-flight probe, ignoring");
            return;
        };
        if !success {
            debug!(uri, "probe failed, gateways stay watched");
            return;
        }
        let snapshot = self.store.acquire();
        for id in ids {
            if let Some(gateway) = snapshot.gateway_by_id(id) {
                gateway.health.report_success();
                info!(gateway = %id, "probe succeeded, gateway active again");
            }
        }
    }

    /// One probe sweep: send a liveness probe to every gateway currently
    /// in `Suspect` or `Inactive` state.
    ///
    /// Probes from the previous sweep that never got a reply are dropped
    /// from the correlation map first; per the state machine only
    /// successful replies cause transitions.
    pub async fn probe_cycle(&self, transport: &dyn ProbeTransport) {
        self.inflight.clear();

        let snapshot = self.store.acquire();
        for gateway in snapshot.gateways() {
            match gateway.health.state() {
                HealthState::Suspect(_) | HealthState::Inactive => {
                    let uri = gateway.probe_uri();
                    debug!(gateway = %gateway.id, uri, "probing");
                    self.inflight.entry(uri.clone()).or_default().push(gateway.id);
                    transport.send_probe(&uri).await;
                }
                HealthState::Active => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use switchyard_core::config::{CapacityLimits, ConfigRows, GatewayRow};
    use switchyard_core::domain::gateway::{Scheme, Transport};
    use switchyard_core::snapshot::{build_snapshot, Snapshot};

    fn snapshot(hosts: &[&str]) -> Snapshot {
        let gateways = hosts
            .iter()
            .enumerate()
            .map(|(i, host)| GatewayRow {
                id: i as u32 + 1,
                host: (*host).into(),
                port: Some(5060),
                scheme: Scheme::Sip,
                transport: Transport::Udp,
                strip: 0,
                prefix: String::new(),
                weight: 1,
                group: 0,
                flags: 0,
            })
            .collect();
        let rows = ConfigRows {
            gateways,
            rules: vec![],
            targets: vec![],
        };
        build_snapshot(&rows, &CapacityLimits::default(), 1).unwrap()
    }

    fn monitor(hosts: &[&str]) -> HealthMonitor {
        let store = Arc::new(SnapshotStore::default());
        store.publish(snapshot(hosts)).unwrap();
        HealthMonitor::new(store, HealthConfig::default())
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProbeTransport for RecordingTransport {
        async fn send_probe(&self, uri: &str) {
            self.sent.lock().unwrap().push(uri.to_string());
        }
    }

    #[test]
    fn failure_reports_walk_the_state_machine() {
        let m = monitor(&["a.example"]);
        let id = GatewayId(1);
        assert_eq!(m.report_failure(id), Some(HealthState::Suspect(2)));
        assert_eq!(m.report_failure(id), Some(HealthState::Suspect(1)));
        assert_eq!(m.report_failure(id), Some(HealthState::Inactive));
    }

    #[test]
    fn unknown_gateway_failure_is_ignored() {
        let m = monitor(&["a.example"]);
        assert_eq!(m.report_failure(GatewayId(99)), None);
    }

    #[tokio::test]
    async fn only_watched_gateways_are_probed() {
        let m = monitor(&["a.example", "b.example"]);
        m.report_failure(GatewayId(2));

        let transport = RecordingTransport::default();
        m.probe_cycle(&transport).await;

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["sip:b.example:5060".to_string()]);
    }

    #[tokio::test]
    async fn successful_probe_reply_restores_active() {
        let m = monitor(&["a.example"]);
        let id = GatewayId(1);
        m.report_failure(id);
        m.report_failure(id);
        m.report_failure(id);

        let transport = RecordingTransport::default();
        m.probe_cycle(&transport).await;
        m.on_probe_result(true, "sip:a.example:5060");

        let snapshot = m.store.acquire();
        assert_eq!(
            snapshot.gateway_by_id(id).unwrap().health.state(),
            HealthState::Active
        );
    }

    #[tokio::test]
    async fn failed_or_uncorrelated_replies_change_nothing() {
        let m = monitor(&["a.example"]);
        let id = GatewayId(1);
        m.report_failure(id);

        let transport = RecordingTransport::default();
        m.probe_cycle(&transport).await;
        m.on_probe_result(false, "sip:a.example:5060");
        m.on_probe_result(true, "sip:stranger.example");

        let snapshot = m.store.acquire();
        assert_eq!(
            snapshot.gateway_by_id(id).unwrap().health.state(),
            HealthState::Suspect(2)
        );
    }

    #[tokio::test]
    async fn gateways_sharing_an_address_across_groups_are_both_restored() {
        // Duplicate hosts are only rejected within one group, so two
        // gateways may legitimately answer at the same probe URI.
        let mut rows = ConfigRows {
            gateways: vec![],
            rules: vec![],
            targets: vec![],
        };
        for (id, group) in [(1, 0), (2, 7)] {
            rows.gateways.push(GatewayRow {
                id,
                host: "shared.example".into(),
                port: Some(5060),
                scheme: Scheme::Sip,
                transport: Transport::Udp,
                strip: 0,
                prefix: String::new(),
                weight: 1,
                group,
                flags: 0,
            });
        }
        let store = Arc::new(SnapshotStore::default());
        store
            .publish(build_snapshot(&rows, &CapacityLimits::default(), 1).unwrap())
            .unwrap();
        let m = HealthMonitor::new(store, HealthConfig::default());

        for _ in 0..3 {
            m.report_failure(GatewayId(1));
            m.report_failure(GatewayId(2));
        }
        m.probe_cycle(&RecordingTransport::default()).await;
        m.on_probe_result(true, "sip:shared.example:5060");

        let snapshot = m.store.acquire();
        for id in [GatewayId(1), GatewayId(2)] {
            assert_eq!(
                snapshot.gateway_by_id(id).unwrap().health.state(),
                HealthState::Active
            );
        }
    }

    #[test]
    fn mark_defunct_sets_a_future_window() {
        let m = monitor(&["a.example"]);
        let until = m.mark_defunct(GatewayId(1), 60).unwrap();
        let snapshot = m.store.acquire();
        let gw = snapshot.gateway_by_id(GatewayId(1)).unwrap();
        assert_eq!(gw.health.defunct_until(), until);
        assert!(gw.health.is_defunct(until - 1));
        assert!(!gw.health.is_defunct(until));
    }
}
