mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, ConfigCommands};
use pm2_dash::core::models::{
    ActionOutcome, ActionRequest, DashboardSnapshot, ManagedProcess, NetworkIdentity, ProcessStatus,
    Probed, SystemSnapshot,
};
use pm2_dash::core::DashboardController;
use pm2_dash::utils::{format_bytes, format_uptime, memory_usage_percent, workload_ports, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    // Config is loaded per command so `config init` can repair a broken file
    match cli.command {
        #[cfg(feature = "server")]
        None => {
            handle_serve(AppConfig::load()?, None, None, false).await?;
        }
        #[cfg(not(feature = "server"))]
        None => {
            handle_status(&AppConfig::load()?, false).await?;
        }
        #[cfg(feature = "server")]
        Some(Commands::Serve { port, host, cors }) => {
            handle_serve(AppConfig::load()?, host, port, cors).await?;
        }
        Some(Commands::Status { all }) => {
            handle_status(&AppConfig::load()?, all).await?;
        }
        Some(Commands::Start { name }) => {
            handle_action(&AppConfig::load()?, "start", name).await?;
        }
        Some(Commands::Stop { name }) => {
            handle_action(&AppConfig::load()?, "stop", name).await?;
        }
        Some(Commands::Restart { name }) => {
            handle_action(&AppConfig::load()?, "restart", name).await?;
        }
        Some(Commands::Delete { name }) => {
            handle_action(&AppConfig::load()?, "delete", name).await?;
        }
        Some(Commands::Logs { name }) => {
            handle_action(&AppConfig::load()?, "logs", name).await?;
        }
        Some(Commands::System) => {
            handle_system(&AppConfig::load()?).await?;
        }
        Some(Commands::Network) => {
            handle_network(&AppConfig::load()?).await?;
        }
        Some(Commands::Ports) => {
            handle_ports();
        }
        Some(Commands::Watch) => {
            handle_watch(&AppConfig::load()?).await?;
        }
        Some(Commands::Config { command }) => {
            handle_config(command, &AppConfig::config_path()?)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so command output stays pipeable
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pm2_dash=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn connect(config: &AppConfig) -> Result<Arc<DashboardController>> {
    Ok(Arc::new(DashboardController::connect(config).await?))
}

#[cfg(feature = "server")]
async fn handle_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>, cors: bool) -> Result<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let token = std::env::var("PM2_DASH_TOKEN").ok();
    let controller = connect(&config).await?;

    pm2_dash::server::run(controller, config.host, config.port, cors || config.cors, token).await
}

async fn handle_status(config: &AppConfig, all: bool) -> Result<()> {
    let controller = connect(config).await?;
    let processes = controller
        .processes(all)
        .await
        .context("Failed to list pm2 processes")?;

    print_processes(&processes);
    Ok(())
}

async fn handle_action(config: &AppConfig, action: &str, name: String) -> Result<()> {
    let controller = connect(config).await?;

    match controller.dispatch(&ActionRequest::new(action, name)).await? {
        ActionOutcome::Completed { success: true, message } => {
            println!("{} {}", "✓".green(), message);
        }
        ActionOutcome::Completed { success: false, message } => {
            bail!("{}", message);
        }
        ActionOutcome::Logs { logs } => {
            for line in logs {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

async fn handle_system(config: &AppConfig) -> Result<()> {
    let controller = connect(config).await?;

    match controller.system().await {
        Probed::Ready { value } => print_system(&value),
        Probed::Degraded { error } => bail!("Host metrics unavailable: {}", error),
    }

    Ok(())
}

async fn handle_network(config: &AppConfig) -> Result<()> {
    let controller = connect(config).await?;

    match controller.network().await {
        Probed::Ready { value } => print_network(&value),
        Probed::Degraded { error } => bail!("Network probe failed: {}", error),
    }

    Ok(())
}

fn handle_ports() {
    println!("{:<12} {:<6}", "Workload", "Port");
    println!("{}", "-".repeat(20));
    for (workload, port) in workload_ports() {
        println!("{:<12} {:<6}", workload, port);
    }
}

async fn handle_watch(config: &AppConfig) -> Result<()> {
    let controller = connect(config).await?;
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let mut snapshots = controller.subscribe(refresh_rx);

    // Every Enter press on stdin forces a refresh
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if refresh_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    println!(
        "Polling every {} (Enter to refresh, Ctrl+C to quit)\n",
        humantime::format_duration(controller.poll_interval())
    );

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else { break };
                print_snapshot(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn handle_config(command: ConfigCommands, path: &Path) -> Result<()> {
    match command {
        ConfigCommands::View => {
            let config = load_with_overrides(path)?;
            println!("Configuration ({}):\n", path.display());
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppConfig::default().save_to(path)?;
            println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        }
        ConfigCommands::Validate => {
            let errors = match load_with_overrides(path) {
                Ok(config) => config.validate(),
                Err(e) => vec![format!("{:#}", e)],
            };

            if errors.is_empty() {
                println!("{} Configuration is valid", "✓".green());
            } else {
                println!("{} Configuration errors:", "✗".red());
                for error in &errors {
                    println!("  - {}", error);
                }
                bail!("{} configuration error(s)", errors.len());
            }
        }
    }

    Ok(())
}

fn load_with_overrides(path: &Path) -> Result<AppConfig> {
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides();
    Ok(config)
}

fn status_label(status: ProcessStatus) -> ColoredString {
    match status {
        ProcessStatus::Online => status.as_str().green(),
        ProcessStatus::Stopped => status.as_str().yellow(),
        ProcessStatus::Errored => status.as_str().red(),
        ProcessStatus::Unknown => status.as_str().dimmed(),
    }
}

fn print_processes(processes: &[ManagedProcess]) {
    println!(
        "{:<22} {:<9} {:>6} {:>10} {:>8} {:>6}",
        "Name", "Status", "CPU%", "Memory", "Restarts", "Port"
    );
    println!("{}", "-".repeat(66));

    if processes.is_empty() {
        println!("{}", "No processes".dimmed());
        return;
    }

    for p in processes {
        println!(
            "{:<22} {:<9} {:>6.1} {:>10} {:>8} {:>6}",
            p.name,
            status_label(p.status),
            p.cpu_percent,
            format_bytes(p.memory_bytes),
            p.restarts,
            p.port
        );
    }
}

fn print_system(system: &SystemSnapshot) {
    println!("Hostname:  {}", system.hostname);
    println!("Platform:  {} ({})", system.platform, system.architecture);
    println!("OS:        {} {}", system.os_name, system.os_version);
    println!("Uptime:    {}", format_uptime(system.uptime_seconds));
    println!(
        "Memory:    {} / {} ({:.1}% used)",
        format_bytes(system.total_mem_bytes - system.free_mem_bytes.min(system.total_mem_bytes)),
        format_bytes(system.total_mem_bytes),
        memory_usage_percent(system.total_mem_bytes, system.free_mem_bytes)
    );
    println!("CPUs:      {}", system.cpu_count);
    let [one, five, fifteen] = system.load_average;
    println!("Load:      {:.2} {:.2} {:.2}", one, five, fifteen);
}

fn print_network(network: &NetworkIdentity) {
    let message = if network.host_address.is_some() {
        network.message.green()
    } else if network.available {
        network.message.yellow()
    } else {
        network.message.red()
    };

    println!("Status:    {}", message);
    println!("Host:      {}", network.host_address.as_deref().unwrap_or("-"));
    println!("Container: {}", network.peer_address.as_deref().unwrap_or("-"));
}

fn print_snapshot(snapshot: &DashboardSnapshot) {
    println!("{}", format!("== {} ==", snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")).bold());

    match &snapshot.processes {
        Probed::Ready { value } => print_processes(value),
        Probed::Degraded { error } => println!("Processes: {}", error.red()),
    }
    println!();
    match &snapshot.system {
        Probed::Ready { value } => print_system(value),
        Probed::Degraded { error } => println!("System: {}", error.red()),
    }
    println!();
    match &snapshot.network {
        Probed::Ready { value } => print_network(value),
        Probed::Degraded { error } => println!("Network: {}", error.red()),
    }
    println!();
}
