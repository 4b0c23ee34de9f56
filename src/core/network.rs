/// Network identity resolution
///
/// Finds the overlay (Tailscale) address of the host and, optionally, of a
/// sandboxed peer container. A persisted setup record always wins; only when
/// it is missing or incomplete is the agent probed live.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::core::error::ProbeError;
use crate::core::models::{NetworkIdentity, NetworkSource};
use crate::utils::first_line;

/// Anything able to report the current network identity
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn resolve(&self) -> NetworkIdentity;
}

/// Live queries against the overlay network agent
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkAgent: Send + Sync {
    async fn is_installed(&self) -> bool;
    async fn host_address(&self) -> Result<String, ProbeError>;
    async fn peer_address(&self) -> Result<String, ProbeError>;
}

/// Setup record written once the overlay network has been configured.
/// Any field may be absent or `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNetworkConfig {
    #[serde(default)]
    pub setup_complete: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "hostIP", default)]
    pub host_ip: Option<String>,
    #[serde(rename = "containerIP", default)]
    pub container_ip: Option<String>,
}

impl PersistedNetworkConfig {
    /// Read the record, treating a missing or unreadable file as absent
    pub async fn read(path: &Path) -> Option<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read network config");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed network config");
                None
            }
        }
    }

    fn host_ip(&self) -> Option<&str> {
        self.host_ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty())
    }

    fn usable(&self) -> bool {
        self.setup_complete.unwrap_or(false) && self.host_ip().is_some()
    }

    fn into_identity(self) -> NetworkIdentity {
        let message = if self.status.as_deref() == Some("connected") {
            "Tailscale connected"
        } else {
            "Host connected, container connecting"
        };
        let host = self.host_ip().unwrap_or_default().to_string();
        let peer = self.container_ip.map(|ip| ip.trim().to_string());

        NetworkIdentity::connected(NetworkSource::PersistedConfig, host, peer, message)
    }
}

pub struct NetworkIdentityResolver {
    config_path: PathBuf,
    agent: Arc<dyn NetworkAgent>,
}

impl NetworkIdentityResolver {
    pub fn new(config_path: impl Into<PathBuf>, agent: Arc<dyn NetworkAgent>) -> Self {
        Self {
            config_path: config_path.into(),
            agent,
        }
    }

    async fn probe_live(&self) -> NetworkIdentity {
        if !self.agent.is_installed().await {
            return NetworkIdentity::unavailable("Tailscale not found on host machine");
        }

        let host = match self.agent.host_address().await {
            Ok(host) => host,
            Err(e) => {
                debug!(error = %e, "tailscale installed but host address unavailable");
                return NetworkIdentity::disconnected("Tailscale found but not connected");
            }
        };

        let peer = match self.agent.peer_address().await {
            Ok(peer) => Some(peer),
            Err(e) => {
                debug!(error = %e, "peer address unavailable");
                None
            }
        };

        NetworkIdentity::connected(NetworkSource::LiveProbe, host, peer, "Tailscale connected")
    }
}

#[async_trait]
impl NetworkProbe for NetworkIdentityResolver {
    async fn resolve(&self) -> NetworkIdentity {
        // A complete setup record preempts live probing entirely
        if let Some(config) = PersistedNetworkConfig::read(&self.config_path).await {
            if config.usable() {
                return config.into_identity();
            }
        }

        self.probe_live().await
    }
}

/// Tailscale CLI on the host, with the peer queried through `docker exec`
#[derive(Debug, Clone)]
pub struct TailscaleAgent {
    binary: String,
    peer_container: Option<String>,
}

impl TailscaleAgent {
    pub fn new(binary: impl Into<String>, peer_container: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            peer_container,
        }
    }
}

#[async_trait]
impl NetworkAgent for TailscaleAgent {
    async fn is_installed(&self) -> bool {
        run_capture("which", &[self.binary.as_str()]).await.is_ok()
    }

    async fn host_address(&self) -> Result<String, ProbeError> {
        let output = run_capture(&self.binary, &["ip", "-4"]).await?;
        first_line(&output).ok_or_else(|| ProbeError::Failed("tailscale reported no address".to_string()))
    }

    async fn peer_address(&self) -> Result<String, ProbeError> {
        let container = self
            .peer_container
            .as_deref()
            .ok_or_else(|| ProbeError::Failed("no peer container configured".to_string()))?;

        let output = run_capture("docker", &["exec", container, self.binary.as_str(), "ip", "-4"]).await?;
        first_line(&output).ok_or_else(|| ProbeError::Failed("peer reported no address".to_string()))
    }
}

/// Run a command and return its stdout if it exits successfully
async fn run_capture(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProbeError::Failed(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Failed(format!("{} failed: {}", program, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
