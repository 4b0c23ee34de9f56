/// pm2 integration
///
/// Drives the pm2 daemon through its CLI: list, start, stop, restart,
/// delete and log tailing, keyed by process name.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::core::error::ManagerError;
use crate::core::models::{ManagedProcess, ProcessStatus};
use crate::utils::{port_for_process, strip_ansi};

/// Control operations of an external process supervisor
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn list(&self) -> Result<Vec<ManagedProcess>, ManagerError>;
    async fn start(&self, name: &str) -> Result<(), ManagerError>;
    async fn stop(&self, name: &str) -> Result<(), ManagerError>;
    async fn restart(&self, name: &str) -> Result<(), ManagerError>;
    async fn delete(&self, name: &str) -> Result<(), ManagerError>;
    /// Most recent log lines, oldest first, at most `max_lines`
    async fn logs(&self, name: &str, max_lines: usize) -> Result<Vec<String>, ManagerError>;
}

#[derive(Debug, Clone)]
pub struct Pm2Manager {
    binary: String,
}

impl Pm2Manager {
    /// Connect to the pm2 daemon, failing if it cannot be reached
    pub async fn connect(binary: impl Into<String>) -> Result<Self, ManagerError> {
        let manager = Self { binary: binary.into() };

        manager
            .pm2_command(&["ping"])
            .await
            .map_err(|e| ManagerError::Unavailable(e.message().to_string()))?;

        info!(binary = %manager.binary, "connected to pm2");
        Ok(manager)
    }

    /// Execute a pm2 command, returning stdout on success
    async fn pm2_command(&self, args: &[&str]) -> Result<String, ManagerError> {
        debug!(binary = %self.binary, ?args, "running pm2");

        let output = Command::new(&self.binary)
            .args(args)
            .env("FORCE_COLOR", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ManagerError::OperationFailed(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = strip_ansi(&String::from_utf8_lossy(&output.stderr));
            let stdout = strip_ansi(&String::from_utf8_lossy(&output.stdout));
            let message = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} exited with {}", self.binary, output.status));
            return Err(ManagerError::OperationFailed(message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Tail of one log stream (`--out` or `--err`)
    async fn stream_tail(&self, name: &str, stream: &str, max_lines: usize) -> Result<Vec<String>, ManagerError> {
        let lines = max_lines.to_string();
        let raw = self
            .pm2_command(&["logs", name, stream, "--lines", &lines, "--nostream", "--raw"])
            .await?;

        Ok(parse_log_output(&raw, max_lines))
    }
}

#[async_trait]
impl ProcessManager for Pm2Manager {
    async fn list(&self) -> Result<Vec<ManagedProcess>, ManagerError> {
        let raw = self.pm2_command(&["jlist"]).await?;
        parse_process_list(&raw)
    }

    async fn start(&self, name: &str) -> Result<(), ManagerError> {
        self.pm2_command(&["start", name]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), ManagerError> {
        self.pm2_command(&["stop", name]).await?;
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), ManagerError> {
        self.pm2_command(&["restart", name]).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), ManagerError> {
        self.pm2_command(&["delete", name]).await?;
        Ok(())
    }

    async fn logs(&self, name: &str, max_lines: usize) -> Result<Vec<String>, ManagerError> {
        // `pm2 logs` prints nothing for unknown names, so check first
        let known = self.list().await?;
        if !known.iter().any(|p| p.name == name) {
            return Err(ManagerError::OperationFailed(format!(
                "process or namespace {} not found",
                name
            )));
        }

        // Each stream is tailed on its own; a noisy stderr must not hide stdout
        let out = self.stream_tail(name, "--out", max_lines).await?;
        let err = self.stream_tail(name, "--err", max_lines).await?;

        Ok(merge_stream_tails(out, err, max_lines))
    }
}

#[derive(Debug, Deserialize)]
struct Pm2ProcessDescription {
    name: String,
    pm_id: Option<u32>,
    pid: Option<u32>,
    #[serde(default)]
    monit: Pm2Monit,
    #[serde(default)]
    pm2_env: Pm2Env,
}

#[derive(Debug, Default, Deserialize)]
struct Pm2Monit {
    #[serde(default)]
    memory: u64,
    #[serde(default)]
    cpu: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Pm2Env {
    status: Option<String>,
    restart_time: Option<u32>,
}

impl From<Pm2ProcessDescription> for ManagedProcess {
    fn from(desc: Pm2ProcessDescription) -> Self {
        let status = desc
            .pm2_env
            .status
            .as_deref()
            .map(ProcessStatus::from)
            .unwrap_or(ProcessStatus::Unknown);

        ManagedProcess {
            port: port_for_process(&desc.name),
            name: desc.name,
            pm_id: desc.pm_id,
            // pm2 reports pid 0 for processes that are not running
            pid: desc.pid.filter(|pid| *pid != 0),
            status,
            cpu_percent: desc.monit.cpu,
            memory_bytes: desc.monit.memory,
            restarts: desc.pm2_env.restart_time.unwrap_or(0),
        }
    }
}

/// Parse `pm2 jlist` output, skipping any banner lines pm2 prints first
pub fn parse_process_list(raw: &str) -> Result<Vec<ManagedProcess>, ManagerError> {
    let json = raw
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('['))
        .ok_or_else(|| ManagerError::OperationFailed("pm2 jlist returned no process list".to_string()))?;

    let descriptions: Vec<Pm2ProcessDescription> = serde_json::from_str(json)
        .map_err(|e| ManagerError::OperationFailed(format!("failed to parse pm2 process list: {}", e)))?;

    Ok(descriptions.into_iter().map(ManagedProcess::from).collect())
}

/// Clean `pm2 logs --raw` output and keep the last `max_lines` lines
pub fn parse_log_output(raw: &str, max_lines: usize) -> Vec<String> {
    let lines: Vec<String> = raw
        .lines()
        .map(strip_ansi)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !is_tail_header(line))
        .collect();

    let skip = lines.len().saturating_sub(max_lines);
    lines.into_iter().skip(skip).collect()
}

/// Join the stdout and stderr tails within `max_lines`, stdout first.
///
/// When both streams overflow, each keeps half the budget; a stream that
/// needs less hands its unused share to the other.
pub fn merge_stream_tails(mut out: Vec<String>, mut err: Vec<String>, max_lines: usize) -> Vec<String> {
    let err_floor = err.len().min(max_lines / 2);
    let out_share = out.len().min(max_lines - err_floor);
    let err_share = err.len().min(max_lines - out_share);

    out.drain(..out.len() - out_share);
    err.drain(..err.len() - err_share);
    out.extend(err);
    out
}

fn is_tail_header(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("[TAILING]") || (line.ends_with(" lines:") && line.contains(".log last "))
}
