/// Snapshot aggregation
///
/// Fans out to the process manager, the host metrics probe and the network
/// resolver concurrently. Each probe is isolated: an error, a panic or a
/// timeout in one becomes a degraded placeholder for that field only.

use chrono::Utc;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::core::error::{ManagerError, ProbeError};
use crate::core::models::{DashboardSnapshot, ManagedProcess, NetworkIdentity, Probed, SystemSnapshot};
use crate::core::network::NetworkProbe;
use crate::core::pm2::ProcessManager;
use crate::core::system::SystemProbe;

pub struct StatusAggregator {
    manager: Arc<dyn ProcessManager>,
    system: Arc<dyn SystemProbe>,
    network: Arc<dyn NetworkProbe>,
    self_name: String,
    probe_timeout: Duration,
}

impl StatusAggregator {
    pub fn new(
        manager: Arc<dyn ProcessManager>,
        system: Arc<dyn SystemProbe>,
        network: Arc<dyn NetworkProbe>,
        self_name: impl Into<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            system,
            network,
            self_name: self_name.into(),
            probe_timeout,
        }
    }

    /// Poll all three sources and merge them into one snapshot
    pub async fn snapshot(&self) -> DashboardSnapshot {
        // Probe calls sit inside async blocks so that a panic raised while
        // building a probe future is caught by `guarded` as well
        let (processes, system, network) = tokio::join!(
            self.guarded("processes", async { self.list_actionable().await }),
            self.guarded("system", async { self.system.collect().await }),
            self.guarded("network", async { Ok::<_, ProbeError>(self.network.resolve().await) }),
        );

        DashboardSnapshot {
            generated_at: Utc::now(),
            processes,
            system,
            network,
        }
    }

    /// Current process list, filtered to actionable entries unless `include_all`
    pub async fn processes(&self, include_all: bool) -> Result<Vec<ManagedProcess>, ManagerError> {
        let processes = self.manager.list().await?;
        if include_all {
            Ok(processes)
        } else {
            Ok(actionable(processes, &self.self_name))
        }
    }

    pub async fn system(&self) -> Probed<SystemSnapshot> {
        self.guarded("system", async { self.system.collect().await }).await
    }

    pub async fn network(&self) -> Probed<NetworkIdentity> {
        self.guarded("network", async { Ok::<_, ProbeError>(self.network.resolve().await) })
            .await
    }

    async fn list_actionable(&self) -> Result<Vec<ManagedProcess>, ProbeError> {
        self.processes(false)
            .await
            .map_err(|e| ProbeError::Failed(e.message().to_string()))
    }

    /// Run one probe with a timeout and panic isolation
    async fn guarded<T, F>(&self, probe: &'static str, fut: F) -> Probed<T>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        let guarded = AssertUnwindSafe(fut).catch_unwind();

        let result = match tokio::time::timeout(self.probe_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProbeError::Panicked),
            Err(_) => Err(ProbeError::TimedOut(self.probe_timeout)),
        };

        match result {
            Ok(value) => Probed::Ready { value },
            Err(e) => {
                warn!(probe, error = %e, "probe degraded");
                Probed::Degraded { error: e.to_string() }
            }
        }
    }
}

/// Processes an operator can act on: online, and not the dashboard itself
pub fn actionable(processes: Vec<ManagedProcess>, self_name: &str) -> Vec<ManagedProcess> {
    processes
        .into_iter()
        .filter(|p| p.name != self_name && p.status.is_online())
        .collect()
}
