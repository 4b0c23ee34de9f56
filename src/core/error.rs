/// Error types for the dashboard core

use std::time::Duration;
use thiserror::Error;

/// Failures reported by the process manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The control channel could not be reached at startup
    #[error("process manager unavailable: {0}")]
    Unavailable(String),

    /// A single operation failed; carries the manager's message verbatim
    #[error("{0}")]
    OperationFailed(String),
}

impl ManagerError {
    pub fn message(&self) -> &str {
        match self {
            ManagerError::Unavailable(msg) | ManagerError::OperationFailed(msg) => msg,
        }
    }
}

/// Caller input rejected before reaching the process manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("appName is required")]
    MissingTarget,
}

/// Why a snapshot probe produced a degraded placeholder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),

    #[error("probe panicked")]
    Panicked,
}
