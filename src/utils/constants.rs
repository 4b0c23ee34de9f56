/// Dashboard constants: defaults, the port naming convention and log caps
///
/// Port numbers mirror the container-to-host mapping of the development
/// workspace the supervised apps run in.

use std::collections::BTreeMap;

/// Name pm2 knows the dashboard itself by
pub const DEFAULT_SELF_NAME: &str = "welcome-app";

pub const DEFAULT_PM2_BIN: &str = "pm2";
pub const DEFAULT_NETWORK_AGENT_BIN: &str = "tailscale";
pub const DEFAULT_PEER_CONTAINER: &str = "claude-cli-container";
pub const DEFAULT_NETWORK_CONFIG: &str = "../../tailscale-config.json";

pub const DEFAULT_POLL_INTERVAL: &str = "5s";
pub const DEFAULT_PROBE_TIMEOUT: &str = "10s";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum number of log lines returned by the `logs` action
pub const MAX_LOG_LINES: usize = 50;

/// Host port used when no naming rule matches
pub const DEFAULT_APP_PORT: u16 = 5301;

/// Host port rules, first matching substring wins
pub const APP_PORT_RULES: &[(&[&str], u16)] = &[
    (&["react", "next"], 5301),
    (&["express", "api"], 5302),
    (&["flask"], 5500),
    (&["django"], 5800),
];

/// Externally exposed host port for a process, derived from its name
pub fn port_for_process(name: &str) -> u16 {
    APP_PORT_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| name.contains(n)))
        .map(|(_, port)| *port)
        .unwrap_or(DEFAULT_APP_PORT)
}

/// Container-side port for each workload class
pub fn workload_ports() -> BTreeMap<&'static str, u16> {
    BTreeMap::from([
        ("welcome", 3000),
        ("react", 3000),
        ("nextjs", 3002),
        ("express", 3001),
        ("flask", 5000),
        ("django", 8000),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_for_process() {
        assert_eq!(port_for_process("react-example"), 5301);
        assert_eq!(port_for_process("next-example"), 5301);
        assert_eq!(port_for_process("express-api"), 5302);
        assert_eq!(port_for_process("my-api"), 5302);
        assert_eq!(port_for_process("flask-example"), 5500);
        assert_eq!(port_for_process("django-example"), 5800);
        assert_eq!(port_for_process("tetris-game"), DEFAULT_APP_PORT);
    }

    #[test]
    fn test_workload_ports() {
        let ports = workload_ports();
        assert_eq!(ports.len(), 6);
        assert_eq!(ports["nextjs"], 3002);
        assert_eq!(ports["django"], 8000);
    }
}
