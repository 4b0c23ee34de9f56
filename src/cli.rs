/// CLI argument parsing

use clap::{Parser, Subcommand};

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "pm2-dash")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP dashboard server (default)
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (overrides config and $PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Enable CORS for cross-origin requests
        #[arg(long)]
        cors: bool,
    },

    /// Show pm2 process status
    Status {
        /// Include stopped processes and the dashboard itself
        #[arg(short, long)]
        all: bool,
    },

    /// Start a pm2 process
    Start { name: String },

    /// Stop a pm2 process
    Stop { name: String },

    /// Restart a pm2 process
    Restart { name: String },

    /// Delete a pm2 process
    Delete { name: String },

    /// Show the last log lines of a pm2 process
    Logs { name: String },

    /// Show host metrics
    System,

    /// Show the Tailscale network identity
    Network,

    /// Show the workload port map
    Ports,

    /// Poll and print snapshots until interrupted (Enter forces a refresh)
    Watch,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View configuration
    View,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate configuration
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_action_and_flags() {
        let cli = Cli::parse_from(["pm2-dash", "stop", "react-example"]);
        assert!(matches!(cli.command, Some(Commands::Stop { ref name }) if name == "react-example"));

        let cli = Cli::parse_from(["pm2-dash", "status", "--all"]);
        assert!(matches!(cli.command, Some(Commands::Status { all: true })));

        let cli = Cli::parse_from(["pm2-dash"]);
        assert!(cli.command.is_none());
    }
}
