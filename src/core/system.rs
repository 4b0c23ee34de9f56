/// Host metrics collection
///
/// Reads hostname, OS, uptime, memory, CPU count and load through sysinfo.
/// Fields the platform cannot provide come back as zero or empty.

use async_trait::async_trait;
use sysinfo::System;

#[cfg(test)]
use mockall::automock;

use crate::core::error::ProbeError;
use crate::core::models::SystemSnapshot;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn collect(&self) -> Result<SystemSnapshot, ProbeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostMetricsProbe;

impl HostMetricsProbe {
    pub fn new() -> Self {
        Self
    }

    /// Blocking read of the OS counters
    pub fn read() -> SystemSnapshot {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        let load = System::load_average();

        SystemSnapshot {
            hostname: System::host_name().unwrap_or_default(),
            platform: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            os_name: System::name().unwrap_or_default(),
            os_version: System::os_version().unwrap_or_default(),
            uptime_seconds: System::uptime(),
            total_mem_bytes: sys.total_memory(),
            free_mem_bytes: sys.available_memory(),
            cpu_count: sys.cpus().len(),
            load_average: [load.one, load.five, load.fifteen],
        }
    }
}

#[async_trait]
impl SystemProbe for HostMetricsProbe {
    async fn collect(&self) -> Result<SystemSnapshot, ProbeError> {
        tokio::task::spawn_blocking(Self::read)
            .await
            .map_err(|e| ProbeError::Failed(format!("metrics task failed: {}", e)))
    }
}
