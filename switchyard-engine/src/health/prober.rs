//! Background prober task driving the periodic liveness-check cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time;

use crate::health::monitor::HealthMonitor;

/// Transport seam for liveness probes.
///
/// Implementations send the probe and return immediately; the reply (or
/// its absence) is reported later through
/// [`HealthMonitor::on_probe_result`] with the same URI, which is the
/// correlation key. The probe path never blocks routing.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Fire a liveness probe at the given URI.
    async fn send_probe(&self, uri: &str);
}

/// Spawn the periodic probe task.
///
/// Every interval tick the monitor probes each gateway currently in
/// `Suspect` or `Inactive` state through the given transport.
pub fn spawn_prober(
    monitor: Arc<HealthMonitor>,
    transport: Arc<dyn ProbeTransport>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);

        // Prevent immediately ticking when spawned.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            monitor.probe_cycle(transport.as_ref()).await;
        }
    })
}
