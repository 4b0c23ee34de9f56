pub mod models;
pub mod error;
pub mod pm2;
pub mod network;
pub mod system;
pub mod aggregator;
pub mod dispatcher;
pub mod controller;

pub use aggregator::StatusAggregator;
pub use controller::DashboardController;
pub use dispatcher::ActionDispatcher;
pub use error::{DispatchError, ManagerError, ProbeError};
pub use network::{NetworkIdentityResolver, TailscaleAgent};
pub use pm2::{Pm2Manager, ProcessManager};
pub use system::HostMetricsProbe;
