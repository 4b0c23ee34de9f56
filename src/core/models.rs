/// Data shapes shared by the probes, the aggregator and the HTTP boundary
///
/// Everything here is rebuilt on every request; nothing is cached between polls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::DispatchError;

/// Process state as reported by pm2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Online,
    Stopped,
    Errored,
    Unknown,
}

impl From<&str> for ProcessStatus {
    fn from(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "online" => ProcessStatus::Online,
            "stopped" => ProcessStatus::Stopped,
            "errored" => ProcessStatus::Errored,
            _ => ProcessStatus::Unknown,
        }
    }
}

impl ProcessStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, ProcessStatus::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Online => "online",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Errored => "errored",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

/// A workload supervised by pm2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProcess {
    pub name: String,
    pub pm_id: Option<u32>,
    pub pid: Option<u32>,
    pub status: ProcessStatus,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub restarts: u32,
    /// Host port derived from the name, for display links only
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub hostname: String,
    pub platform: String,
    pub architecture: String,
    pub os_name: String,
    pub os_version: String,
    pub uptime_seconds: u64,
    pub total_mem_bytes: u64,
    pub free_mem_bytes: u64,
    pub cpu_count: usize,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkSource {
    PersistedConfig,
    LiveProbe,
    Unavailable,
}

/// Overlay network reachability of the host and its sandboxed peer.
///
/// Constructed only through the associated functions so that an unavailable
/// identity never carries addresses and a peer never appears without a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentity {
    pub available: bool,
    pub host_address: Option<String>,
    pub peer_address: Option<String>,
    pub source: NetworkSource,
    pub message: String,
}

impl NetworkIdentity {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            host_address: None,
            peer_address: None,
            source: NetworkSource::Unavailable,
            message: message.into(),
        }
    }

    /// Agent installed but the host has no address
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self {
            available: true,
            host_address: None,
            peer_address: None,
            source: NetworkSource::LiveProbe,
            message: message.into(),
        }
    }

    pub fn connected(
        source: NetworkSource,
        host_address: String,
        peer_address: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            available: true,
            host_address: Some(host_address),
            peer_address: peer_address.filter(|p| !p.trim().is_empty()),
            source,
            message: message.into(),
        }
    }
}

/// Operator command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerb {
    Start,
    Stop,
    Restart,
    Delete,
    Logs,
}

impl ActionVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionVerb::Start => "start",
            ActionVerb::Stop => "stop",
            ActionVerb::Restart => "restart",
            ActionVerb::Delete => "delete",
            ActionVerb::Logs => "logs",
        }
    }

    /// Past tense used in outcome messages
    pub fn past_tense(&self) -> &'static str {
        match self {
            ActionVerb::Start => "Started",
            ActionVerb::Stop => "Stopped",
            ActionVerb::Restart => "Restarted",
            ActionVerb::Delete => "Deleted",
            ActionVerb::Logs => "Fetched logs for",
        }
    }
}

impl FromStr for ActionVerb {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(ActionVerb::Start),
            "stop" => Ok(ActionVerb::Stop),
            "restart" => Ok(ActionVerb::Restart),
            "delete" => Ok(ActionVerb::Delete),
            "logs" => Ok(ActionVerb::Logs),
            other => Err(DispatchError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw action request as received from the UI; the verb is validated on dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub app_name: String,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            app_name: app_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionOutcome {
    Completed { success: bool, message: String },
    Logs { logs: Vec<String> },
}

impl ActionOutcome {
    pub fn succeeded(message: impl Into<String>) -> Self {
        ActionOutcome::Completed {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ActionOutcome::Completed {
            success: false,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ActionOutcome::Completed { success, .. } => *success,
            ActionOutcome::Logs { .. } => true,
        }
    }
}

/// Result of one snapshot probe: its value or a degraded placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Probed<T> {
    Ready { value: T },
    Degraded { error: String },
}

impl<T> Probed<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Probed::Ready { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Probed::Ready { value } => Some(value),
            Probed::Degraded { .. } => None,
        }
    }
}

/// One poll of process, system and network state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub processes: Probed<Vec<ManagedProcess>>,
    pub system: Probed<SystemSnapshot>,
    pub network: Probed<NetworkIdentity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_status_from_str() {
        assert_eq!(ProcessStatus::from("online"), ProcessStatus::Online);
        assert_eq!(ProcessStatus::from("stopped"), ProcessStatus::Stopped);
        assert_eq!(ProcessStatus::from("errored"), ProcessStatus::Errored);
        assert_eq!(ProcessStatus::from("launching"), ProcessStatus::Unknown);
        assert!(ProcessStatus::Online.is_online());
    }

    #[test]
    fn test_action_verb_parsing() {
        assert_eq!("restart".parse::<ActionVerb>().unwrap(), ActionVerb::Restart);
        assert!(matches!(
            "reload".parse::<ActionVerb>(),
            Err(DispatchError::InvalidAction(verb)) if verb == "reload"
        ));
    }

    #[test]
    fn test_connected_identity_drops_blank_peer() {
        let identity = NetworkIdentity::connected(
            NetworkSource::PersistedConfig,
            "100.64.0.1".to_string(),
            Some("  ".to_string()),
            "Tailscale connected",
        );
        assert!(identity.available);
        assert_eq!(identity.peer_address, None);
    }

    #[test]
    fn test_wire_format() {
        let outcome = serde_json::to_value(ActionOutcome::succeeded("Stopped react-example")).unwrap();
        assert_eq!(outcome, serde_json::json!({"success": true, "message": "Stopped react-example"}));

        let identity = serde_json::to_value(NetworkIdentity::unavailable("none")).unwrap();
        assert_eq!(identity["source"], "unavailable");
        assert_eq!(identity["hostAddress"], serde_json::Value::Null);

        let degraded: Probed<SystemSnapshot> = Probed::Degraded { error: "boom".to_string() };
        let value = serde_json::to_value(degraded).unwrap();
        assert_eq!(value, serde_json::json!({"state": "degraded", "error": "boom"}));
    }

    #[test]
    fn test_action_request_accepts_ui_body() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"action":"stop","appName":"react-example"}"#).unwrap();
        assert_eq!(request, ActionRequest::new("stop", "react-example"));
    }
}
