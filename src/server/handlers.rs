/// API Request Handlers
/// Thin adapters over DashboardController; status codes are decided here

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::core::error::DispatchError;
use crate::core::models::{
    ActionOutcome, ActionRequest, DashboardSnapshot, ManagedProcess, NetworkIdentity, Probed,
    SystemSnapshot,
};

use super::routes::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    apps: Vec<ManagedProcess>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    all: bool,
}

/// Failures mapped onto HTTP status codes
#[derive(Debug)]
pub enum ApiError {
    /// Caller error on the action route
    BadRequest(String),
    /// A probe or the process manager failed
    Internal(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": error })),
            )
                .into_response(),
            ApiError::Unavailable(error) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "error": error })),
            )
                .into_response(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

// ============================================================================
// Read Handlers
// ============================================================================

pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let apps = state
        .controller
        .processes(query.all)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(StatusResponse { apps }))
}

pub async fn get_system(State(state): State<AppState>) -> Result<Json<SystemSnapshot>, ApiError> {
    match state.controller.system().await {
        Probed::Ready { value } => Ok(Json(value)),
        Probed::Degraded { error } => Err(ApiError::Unavailable(error)),
    }
}

pub async fn get_ports(State(state): State<AppState>) -> Json<BTreeMap<&'static str, u16>> {
    Json(state.controller.ports())
}

pub async fn get_tailscale(State(state): State<AppState>) -> Json<NetworkIdentity> {
    // The resolver never fails on its own; only a panic or timeout lands here
    match state.controller.network().await {
        Probed::Ready { value } => Json(value),
        Probed::Degraded { error } => Json(NetworkIdentity::unavailable(error)),
    }
}

pub async fn get_snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.controller.snapshot().await)
}

pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::ok("healthy".to_string()))
}

// ============================================================================
// Action Handler
// ============================================================================

pub async fn pm2_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.controller.dispatch(&request).await?;

    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json::<ActionOutcome>(outcome)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::tests::{sample_network, sample_processes, sample_system};
    use crate::core::error::{ManagerError, ProbeError};
    use crate::core::network::MockNetworkProbe;
    use crate::core::pm2::{MockProcessManager, ProcessManager};
    use crate::core::system::MockSystemProbe;
    use crate::core::{ActionDispatcher, DashboardController, StatusAggregator};
    use crate::server::create_router;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use mockall::predicate::eq;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_with(manager: MockProcessManager, system: MockSystemProbe, token: Option<&str>) -> AppState {
        let mut network = MockNetworkProbe::new();
        network.expect_resolve().returning(sample_network);
        state_from(manager, system, network, token)
    }

    fn state_from(
        manager: MockProcessManager,
        system: MockSystemProbe,
        network: MockNetworkProbe,
        token: Option<&str>,
    ) -> AppState {
        let manager: Arc<dyn ProcessManager> = Arc::new(manager);
        let aggregator = StatusAggregator::new(
            Arc::clone(&manager),
            Arc::new(system),
            Arc::new(network),
            "welcome-app",
            Duration::from_secs(10),
        );
        let controller = DashboardController::new(
            aggregator,
            ActionDispatcher::new(manager),
            Duration::from_secs(5),
        );

        AppState::new(Arc::new(controller), token.map(str::to_string))
    }

    fn healthy_system() -> MockSystemProbe {
        let mut system = MockSystemProbe::new();
        system.expect_collect().returning(|| Ok(sample_system()));
        system
    }

    fn state(manager: MockProcessManager) -> AppState {
        state_with(manager, healthy_system(), None)
    }

    async fn call(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state, false).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn action(body: &str) -> Request<Body> {
        Request::post("/api/pm2/action")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_returns_actionable_apps() {
        let mut manager = MockProcessManager::new();
        manager.expect_list().times(1).returning(|| Ok(sample_processes()));

        let (status, body) = call(state(manager), get("/api/status")).await;

        assert_eq!(status, StatusCode::OK);
        let apps = body["apps"].as_array().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0]["name"], "react-example");
        assert_eq!(apps[0]["port"], 5301);
    }

    #[tokio::test]
    async fn test_status_all_returns_everything() {
        let mut manager = MockProcessManager::new();
        manager.expect_list().returning(|| Ok(sample_processes()));

        let (_, body) = call(state(manager), get("/api/status?all=true")).await;
        assert_eq!(body["apps"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_status_list_failure_is_500() {
        let mut manager = MockProcessManager::new();
        manager
            .expect_list()
            .returning(|| Err(ManagerError::OperationFailed("connect ECONNREFUSED".to_string())));

        let (status, body) = call(state(manager), get("/api/status")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "connect ECONNREFUSED");
    }

    #[tokio::test]
    async fn test_stop_action_succeeds() {
        let mut manager = MockProcessManager::new();
        manager
            .expect_stop()
            .with(eq("react-example"))
            .times(1)
            .returning(|_| Ok(()));

        let (status, body) = call(state(manager), action(r#"{"action":"stop","appName":"react-example"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "message": "Stopped react-example" }));
    }

    #[tokio::test]
    async fn test_restart_unknown_app_reports_manager_error() {
        let mut manager = MockProcessManager::new();
        manager
            .expect_restart()
            .with(eq("unknown-app"))
            .times(1)
            .returning(|_| Err(ManagerError::OperationFailed("process not found".to_string())));

        let (status, body) = call(state(manager), action(r#"{"action":"restart","appName":"unknown-app"}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "success": false, "message": "process not found" }));
    }

    #[tokio::test]
    async fn test_invalid_action_is_400() {
        let mut manager = MockProcessManager::new();
        manager.expect_start().never();

        let (status, body) = call(state(manager), action(r#"{"action":"explode","appName":"react-example"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid action: explode");
    }

    #[tokio::test]
    async fn test_missing_app_name_is_400() {
        let (status, body) = call(state(MockProcessManager::new()), action(r#"{"action":"stop"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "appName is required");
    }

    #[tokio::test]
    async fn test_logs_action_returns_lines() {
        let mut manager = MockProcessManager::new();
        manager
            .expect_logs()
            .returning(|_, _| Ok(vec!["listening on 5301".to_string()]));

        let (status, body) = call(state(manager), action(r#"{"action":"logs","appName":"react-example"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "logs": ["listening on 5301"] }));
    }

    #[tokio::test]
    async fn test_action_requires_token_when_configured() {
        let mut manager = MockProcessManager::new();
        manager.expect_stop().times(1).returning(|_| Ok(()));
        let state = state_with(manager, healthy_system(), Some("s3cret"));

        let (status, _) = call(state.clone(), action(r#"{"action":"stop","appName":"react-example"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::post("/api/pm2/action")
            .header("content-type", "application/json")
            .header("Authorization", "Bearer s3cret")
            .body(Body::from(r#"{"action":"stop","appName":"react-example"}"#))
            .unwrap();
        let (status, body) = call(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_system_and_degraded_system() {
        let (status, body) = call(state(MockProcessManager::new()), get("/api/system")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hostname"], "devbox");
        assert_eq!(body["cpuCount"], 8);

        let mut system = MockSystemProbe::new();
        system
            .expect_collect()
            .returning(|| Err(ProbeError::Failed("sysinfo unsupported".to_string())));
        let (status, body) = call(state_with(MockProcessManager::new(), system, None), get("/api/system")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "sysinfo unsupported");
    }

    #[tokio::test]
    async fn test_ports_tailscale_and_health() {
        let (_, ports) = call(state(MockProcessManager::new()), get("/api/ports")).await;
        assert_eq!(ports["django"], 8000);

        let (_, network) = call(state(MockProcessManager::new()), get("/api/tailscale")).await;
        assert_eq!(network["available"], true);
        assert_eq!(network["hostAddress"], "100.64.0.1");

        let (_, health) = call(state(MockProcessManager::new()), get("/api/health")).await;
        assert_eq!(health, json!({ "success": true, "data": "healthy" }));
    }

    #[tokio::test]
    async fn test_tailscale_degraded_becomes_unavailable_identity() {
        let mut network = MockNetworkProbe::new();
        network.expect_resolve().returning(|| panic!("resolver exploded"));
        let state = state_from(MockProcessManager::new(), healthy_system(), network, None);

        let (status, body) = call(state, get("/api/tailscale")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], false);
        assert_eq!(body["hostAddress"], Value::Null);
        assert_eq!(body["peerAddress"], Value::Null);
        assert_eq!(body["source"], "unavailable");
        assert_eq!(body["message"], "probe panicked");
    }

    #[tokio::test]
    async fn test_snapshot_marks_degraded_fields() {
        let mut manager = MockProcessManager::new();
        manager
            .expect_list()
            .returning(|| Err(ManagerError::OperationFailed("connect ECONNREFUSED".to_string())));

        let (status, body) = call(state(manager), get("/api/snapshot")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processes"]["state"], "degraded");
        assert_eq!(body["processes"]["error"], "connect ECONNREFUSED");
        assert_eq!(body["system"]["state"], "ready");
        assert_eq!(body["system"]["value"]["hostname"], "devbox");
        assert!(body["generatedAt"].is_string());
    }
}
