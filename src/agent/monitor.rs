//! Agent liveness monitoring
//!
//! One routine, `probe()`, decides the connection status. A background task
//! calls it on a fixed cadence, and `refresh()` wakes that task early. Direct
//! `probe()` calls may overlap with the background loop; whichever probe
//! resolves last owns the shared record.

use crate::agent::client::AgentClient;
use crate::agent::connection::{AgentConnection, ConnectionState};
use crate::core::config::AgentSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Keeps `ConnectionState` current by probing `/health`
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    client: AgentClient,
    state: ConnectionState,
    interval: Duration,
    timeout: Duration,
    refresh: Arc<Notify>,
}

impl ConnectionMonitor {
    pub fn new(
        client: AgentClient,
        state: ConnectionState,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            state,
            interval,
            timeout,
            refresh: Arc::new(Notify::new()),
        }
    }

    pub fn from_settings(settings: &AgentSettings, state: ConnectionState) -> Self {
        Self::new(
            AgentClient::from_settings(settings),
            state,
            settings.probe_interval(),
            settings.probe_timeout(),
        )
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Probe the agent once and publish the outcome
    ///
    /// Status reads `Checking` while the probe is outstanding. Success
    /// publishes `Online` with the advertised version and tools; timeout,
    /// refusal, non-2xx or an unreadable body publish `Offline`.
    pub async fn probe(&self) -> AgentConnection {
        self.state.publish(AgentConnection::checking());

        let connection = match self.client.health(self.timeout).await {
            Ok(report) => {
                debug!(version = ?report.version, "Agent health check succeeded");
                AgentConnection::online(report.version, report.allowed_tools)
            }
            Err(e) => {
                debug!(error = %e, "Agent health check failed");
                AgentConnection::offline()
            }
        };

        self.state.publish(connection.clone());
        connection
    }

    /// Wake the background loop for an immediate probe
    ///
    /// If a probe is already running, the next one starts as soon as it
    /// finishes.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Start the periodic probe loop
    ///
    /// Probes immediately, then every `interval` or on `refresh()`, until
    /// `shutdown` is cancelled.
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            info!(
                endpoint = monitor.client.base_url(),
                interval = ?monitor.interval,
                "Connection monitor started"
            );
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = monitor.probe() => {}
                }

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = monitor.refresh.notified() => debug!("On-demand probe requested"),
                    _ = tokio::time::sleep(monitor.interval) => {}
                }
            }
            info!("Connection monitor stopped");
        })
    }
}
