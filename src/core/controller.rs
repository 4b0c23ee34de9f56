/// Dashboard composition root
///
/// Wires the pm2 client, host metrics probe and network resolver into a
/// `StatusAggregator` / `ActionDispatcher` pair and owns the polling cadence.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::core::aggregator::StatusAggregator;
use crate::core::dispatcher::ActionDispatcher;
use crate::core::error::{DispatchError, ManagerError};
use crate::core::models::{
    ActionOutcome, ActionRequest, DashboardSnapshot, ManagedProcess, NetworkIdentity, Probed,
    SystemSnapshot,
};
use crate::core::network::{NetworkIdentityResolver, TailscaleAgent};
use crate::core::pm2::{Pm2Manager, ProcessManager};
use crate::core::system::HostMetricsProbe;
use crate::utils::{workload_ports, AppConfig};

pub struct DashboardController {
    aggregator: StatusAggregator,
    dispatcher: ActionDispatcher,
    poll_interval: Duration,
}

impl DashboardController {
    pub fn new(aggregator: StatusAggregator, dispatcher: ActionDispatcher, poll_interval: Duration) -> Self {
        Self {
            aggregator,
            dispatcher,
            poll_interval,
        }
    }

    /// Build the controller from configuration. Fails if pm2 is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let poll_interval = config.poll_interval()?;
        let probe_timeout = config.probe_timeout()?;
        anyhow::ensure!(!poll_interval.is_zero(), "poll_interval must be greater than zero");
        anyhow::ensure!(!probe_timeout.is_zero(), "probe_timeout must be greater than zero");

        let manager: Arc<dyn ProcessManager> = Arc::new(
            Pm2Manager::connect(config.pm2_bin.clone())
                .await
                .context("Failed to connect to pm2. Is it installed and on PATH?")?,
        );

        let agent = TailscaleAgent::new(
            config.network_agent_bin.clone(),
            config.peer_container().map(str::to_string),
        );
        let resolver = NetworkIdentityResolver::new(config.network_config.clone(), Arc::new(agent));

        let aggregator = StatusAggregator::new(
            Arc::clone(&manager),
            Arc::new(HostMetricsProbe::new()),
            Arc::new(resolver),
            config.self_name.clone(),
            probe_timeout,
        );
        let dispatcher = ActionDispatcher::new(manager);

        Ok(Self::new(aggregator, dispatcher, poll_interval))
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.aggregator.snapshot().await
    }

    pub async fn processes(&self, include_all: bool) -> Result<Vec<ManagedProcess>, ManagerError> {
        self.aggregator.processes(include_all).await
    }

    pub async fn system(&self) -> Probed<SystemSnapshot> {
        self.aggregator.system().await
    }

    pub async fn network(&self) -> Probed<NetworkIdentity> {
        self.aggregator.network().await
    }

    pub fn ports(&self) -> BTreeMap<&'static str, u16> {
        workload_ports()
    }

    pub async fn dispatch(&self, request: &ActionRequest) -> Result<ActionOutcome, DispatchError> {
        self.dispatcher.dispatch(request).await
    }

    /// Stream a fresh snapshot every poll tick, plus one per refresh request.
    ///
    /// The first snapshot is produced immediately. A refresh does not move the
    /// next scheduled tick. The polling task stops once the receiver is dropped.
    pub fn subscribe(self: &Arc<Self>, mut refresh: mpsc::Receiver<()>) -> mpsc::Receiver<DashboardSnapshot> {
        let (tx, rx) = mpsc::channel(1);
        let controller = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut refresh_open = true;

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                    request = refresh.recv(), if refresh_open => {
                        if request.is_none() {
                            refresh_open = false;
                            continue;
                        }
                        debug!("manual refresh requested");
                    }
                }

                let snapshot = controller.snapshot().await;
                if tx.send(snapshot).await.is_err() {
                    break;
                }
            }

            debug!("snapshot subscriber gone, polling stopped");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::tests::{sample_network, sample_processes, sample_system};
    use crate::core::network::MockNetworkProbe;
    use crate::core::pm2::MockProcessManager;
    use crate::core::system::MockSystemProbe;
    use tokio::time::Instant;

    fn controller(poll_interval: Duration) -> Arc<DashboardController> {
        let mut manager = MockProcessManager::new();
        manager.expect_list().returning(|| Ok(sample_processes()));
        let mut system = MockSystemProbe::new();
        system.expect_collect().returning(|| Ok(sample_system()));
        let mut network = MockNetworkProbe::new();
        network.expect_resolve().returning(sample_network);

        let manager: Arc<dyn ProcessManager> = Arc::new(manager);
        let aggregator = StatusAggregator::new(
            Arc::clone(&manager),
            Arc::new(system),
            Arc::new(network),
            "welcome-app",
            Duration::from_secs(10),
        );

        Arc::new(DashboardController::new(
            aggregator,
            ActionDispatcher::new(manager),
            poll_interval,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_polls_on_interval() {
        let controller = controller(Duration::from_secs(5));
        let (_refresh_tx, refresh_rx) = mpsc::channel(1);
        let mut snapshots = controller.subscribe(refresh_rx);

        let start = Instant::now();
        let first = snapshots.recv().await.unwrap();
        assert!(first.processes.is_ready());
        assert!(start.elapsed() < Duration::from_secs(1));

        snapshots.recv().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fetches_immediately() {
        let controller = controller(Duration::from_secs(5));
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let mut snapshots = controller.subscribe(refresh_rx);

        snapshots.recv().await.unwrap();
        let start = Instant::now();
        refresh_tx.send(()).await.unwrap();
        snapshots.recv().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_survives_closed_refresh_channel() {
        let controller = controller(Duration::from_secs(5));
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        drop(refresh_tx);
        let mut snapshots = controller.subscribe(refresh_rx);

        assert!(snapshots.recv().await.is_some());
        assert!(snapshots.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_connect_rejects_zero_probe_timeout() {
        let config = AppConfig {
            pm2_bin: "/nonexistent/pm2-binary".to_string(),
            probe_timeout: "0s".to_string(),
            ..AppConfig::default()
        };

        let err = DashboardController::connect(&config).await.err().unwrap();
        assert!(err.to_string().contains("probe_timeout"));
    }

    #[tokio::test]
    async fn test_status_and_ports() {
        let controller = controller(Duration::from_secs(5));
        assert_eq!(controller.processes(false).await.unwrap().len(), 1);
        assert_eq!(controller.ports()["flask"], 5000);
        assert_eq!(controller.poll_interval(), Duration::from_secs(5));
    }
}
