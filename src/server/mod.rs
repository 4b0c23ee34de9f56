/// HTTP API server for the pm2 dashboard
/// Exposes the controller's snapshot and action operations as REST + WebSocket

#[cfg(feature = "server")]
pub mod routes;

#[cfg(feature = "server")]
pub mod handlers;

#[cfg(feature = "server")]
pub mod websocket;

#[cfg(feature = "server")]
pub mod auth;

#[cfg(feature = "server")]
pub use routes::{create_router, AppState};

#[cfg(feature = "server")]
pub async fn run(
    controller: std::sync::Arc<crate::core::DashboardController>,
    host: String,
    port: u16,
    enable_cors: bool,
    token: Option<String>,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use colored::Colorize;
    use std::net::SocketAddr;

    let auth_enabled = token.is_some();
    let app = create_router(AppState::new(controller, token), enable_cors);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    println!("{}", "pm2 dashboard server".bold());
    println!("   API:    http://{}/api", addr);
    if auth_enabled {
        println!("   Auth:   {}", "enabled for /api/pm2/action".green());
    } else {
        println!("   Auth:   {}", "disabled (PM2_DASH_TOKEN not set)".yellow());
    }
    println!();
    println!("API endpoints:");
    println!("   GET  /api/status[?all=true]  - Actionable pm2 processes");
    println!("   GET  /api/system             - Host metrics");
    println!("   GET  /api/ports              - Workload port map");
    println!("   GET  /api/tailscale          - Network identity");
    println!("   GET  /api/snapshot           - Aggregated snapshot");
    println!("   GET  /api/health             - Health check");
    println!("   POST /api/pm2/action         - start|stop|restart|delete|logs");
    println!("   GET  /ws/snapshot            - Live snapshot stream");
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "dashboard server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
