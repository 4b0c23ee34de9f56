/// API Routes definition

use axum::{
    Router,
    routing::{get, post},
    middleware,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::DashboardController;

use super::handlers;
use super::websocket;
use super::auth;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<DashboardController>,
    /// Token required for mutating routes; `None` leaves them open
    pub token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(controller: Arc<DashboardController>, token: Option<String>) -> Self {
        Self {
            controller,
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }
}

pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    // Protected routes (require the token when one is configured)
    let protected_routes = Router::new()
        .route("/api/pm2/action", post(handlers::pm2_action))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    // Public routes (read-only)
    let public_routes = Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/system", get(handlers::get_system))
        .route("/api/ports", get(handlers::get_ports))
        .route("/api/tailscale", get(handlers::get_tailscale))
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/api/health", get(handlers::health_check))
        .route("/ws/snapshot", get(websocket::ws_snapshot_handler));

    let mut app = Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}
