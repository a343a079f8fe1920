//! Switchyard admin control plane.
//!
//! Operator-facing entry points over a running engine: trigger a reload,
//! mark a gateway defunct for a while, and dump the current gateways and
//! rules for diagnostics.

pub mod view;

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use switchyard_core::{CapacityLimits, ConfigError, ConfigSource, GatewayId, SnapshotStore};
use switchyard_engine::{HealthMonitor, ReloadService};

pub use view::{GatewayView, RuleView, TargetView};

/// Failure modes of administrative commands.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The reload path failed; the previous snapshot stays in service.
    #[error(transparent)]
    Reload(#[from] ConfigError),

    /// A command referenced a gateway that is not in the current snapshot.
    #[error("unknown gateway {0}")]
    UnknownGateway(GatewayId),
}

/// Administrative surface over the snapshot store, reload service, and
/// health monitor.
pub struct AdminApi<S: ConfigSource> {
    store: Arc<SnapshotStore>,
    reload: ReloadService<S>,
    monitor: Arc<HealthMonitor>,
}

impl<S: ConfigSource> AdminApi<S> {
    /// Wire the admin surface over an engine's parts.
    pub fn new(store: Arc<SnapshotStore>, source: S, monitor: Arc<HealthMonitor>) -> Self {
        let reload = ReloadService::new(Arc::clone(&store), source, CapacityLimits::default());
        Self {
            store,
            reload,
            monitor,
        }
    }

    /// As [`AdminApi::new`], with explicit capacity limits.
    pub fn with_limits(
        store: Arc<SnapshotStore>,
        source: S,
        monitor: Arc<HealthMonitor>,
        limits: CapacityLimits,
    ) -> Self {
        let reload = ReloadService::new(Arc::clone(&store), source, limits);
        Self {
            store,
            reload,
            monitor,
        }
    }

    /// Reload configuration from the source; returns the new generation.
    pub fn reload(&self) -> Result<u64, AdminError> {
        self.reload.reload().map_err(|err| {
            warn!(%err, "operator reload failed");
            AdminError::Reload(err)
        })
    }

    /// Exclude a gateway from selection for `seconds` from now.
    pub fn defunct_gateway(&self, id: GatewayId, seconds: u64) -> Result<u64, AdminError> {
        self.monitor
            .mark_defunct(id, seconds)
            .ok_or(AdminError::UnknownGateway(id))
    }

    /// Read-only view of the current gateway table.
    pub fn dump_gateways(&self) -> Vec<GatewayView> {
        let snapshot = self.store.acquire();
        snapshot.gateways().iter().map(GatewayView::from).collect()
    }

    /// Read-only view of the current rule table.
    pub fn dump_rules(&self) -> Vec<RuleView> {
        let snapshot = self.store.acquire();
        snapshot
            .rules()
            .iter()
            .map(|rule| RuleView::new(rule, snapshot.gateways()))
            .collect()
    }

    /// Generation of the currently published snapshot.
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// The whole published configuration as one JSON document, for the
    /// operator diagnostics interface.
    ///
    /// All sections are built from one snapshot handle, so the generation
    /// number always matches the tables even when a reload lands mid-dump.
    pub fn dump_json(&self) -> Result<String, serde_json::Error> {
        #[derive(serde::Serialize)]
        struct Dump {
            generation: u64,
            gateways: Vec<GatewayView>,
            rules: Vec<RuleView>,
        }
        let snapshot = self.store.acquire();
        serde_json::to_string_pretty(&Dump {
            generation: snapshot.generation(),
            gateways: snapshot.gateways().iter().map(GatewayView::from).collect(),
            rules: snapshot
                .rules()
                .iter()
                .map(|rule| RuleView::new(rule, snapshot.gateways()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::config::{ConfigRows, GatewayRow, RuleRow, TargetRow};
    use switchyard_core::domain::gateway::{HealthState, Scheme, Transport};
    use switchyard_engine::health::monitor::HealthConfig;

    struct FixedSource(ConfigRows);

    impl ConfigSource for FixedSource {
        fn load(&self) -> Result<ConfigRows, ConfigError> {
            Ok(self.0.clone())
        }
    }

    fn rows() -> ConfigRows {
        ConfigRows {
            gateways: vec![GatewayRow {
                id: 1,
                host: "a.example".into(),
                port: Some(5060),
                scheme: Scheme::Sip,
                transport: Transport::Tcp,
                strip: 2,
                prefix: "+358".into(),
                weight: 10,
                group: 3,
                flags: 0,
            }],
            rules: vec![RuleRow {
                id: 10,
                prefix: "1".into(),
                caller_pattern: Some("^sip:vip@".into()),
                request_pattern: None,
                stopper: true,
                group: 3,
                enabled: true,
            }],
            targets: vec![TargetRow {
                rule_id: 10,
                gateway_id: 1,
                priority: 2,
                weight: None,
            }],
        }
    }

    fn api() -> AdminApi<FixedSource> {
        let store = Arc::new(SnapshotStore::default());
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            HealthConfig::default(),
        ));
        AdminApi::new(store, FixedSource(rows()), monitor)
    }

    #[test]
    fn reload_then_dump_shows_the_tables() {
        let api = api();
        assert_eq!(api.reload().unwrap(), 1);

        let gws = api.dump_gateways();
        assert_eq!(gws.len(), 1);
        assert_eq!(gws[0].host, "a.example");
        assert_eq!(gws[0].weight, 10);
        assert_eq!(gws[0].health, HealthState::Active);

        let rules = api.dump_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].prefix, "1");
        assert!(rules[0].stopper);
        assert_eq!(rules[0].caller_pattern.as_deref(), Some("^sip:vip@"));
        assert_eq!(rules[0].targets[0].gateway_id, GatewayId(1));
        assert_eq!(rules[0].targets[0].priority, 2);

        // The dump is serializable for the operator interface.
        let json = api.dump_json().unwrap();
        assert!(json.contains("a.example"));
        assert!(json.contains("\"generation\": 1"));
    }

    #[test]
    fn dump_json_is_generation_consistent_under_reload() {
        // The source names the gateway after the generation its rows will
        // be published as, so a dump mixing sections from two generations
        // is detectable.
        struct CountingSource(std::sync::atomic::AtomicU64);

        impl ConfigSource for CountingSource {
            fn load(&self) -> Result<ConfigRows, ConfigError> {
                let generation = self
                    .0
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                    + 1;
                let mut rows = rows();
                rows.gateways[0].host = format!("gen{generation}.example");
                Ok(rows)
            }
        }

        let store = Arc::new(SnapshotStore::default());
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&store),
            HealthConfig::default(),
        ));
        let api = Arc::new(AdminApi::new(
            store,
            CountingSource(std::sync::atomic::AtomicU64::new(0)),
            monitor,
        ));
        api.reload().unwrap();

        let reloader = {
            let api = Arc::clone(&api);
            std::thread::spawn(move || {
                for _ in 0..30 {
                    api.reload().unwrap();
                }
            })
        };

        while !reloader.is_finished() {
            let doc: serde_json::Value =
                serde_json::from_str(&api.dump_json().unwrap()).unwrap();
            let generation = doc["generation"].as_u64().unwrap();
            let host = doc["gateways"][0]["host"].as_str().unwrap();
            assert_eq!(host, format!("gen{generation}.example"));
        }
        reloader.join().unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&api.dump_json().unwrap()).unwrap();
        assert_eq!(doc["generation"].as_u64(), Some(31));
        assert_eq!(doc["gateways"][0]["host"].as_str(), Some("gen31.example"));
    }

    #[test]
    fn defunct_command_targets_a_known_gateway() {
        let api = api();
        api.reload().unwrap();

        let until = api.defunct_gateway(GatewayId(1), 30).unwrap();
        let gws = api.dump_gateways();
        assert_eq!(gws[0].defunct_until, Some(until));

        assert!(matches!(
            api.defunct_gateway(GatewayId(9), 30),
            Err(AdminError::UnknownGateway(GatewayId(9)))
        ));
    }
}
