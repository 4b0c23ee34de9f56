/// Token authentication for mutating API routes

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use super::routes::AppState;

/// Check if request carries the configured token
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(expected) = state.token.as_deref() else {
        // No token configured, allow access
        return Ok(next.run(request).await);
    };

    match provided_token(&headers) {
        Some(provided) if provided == expected => Ok(next.run(request).await),
        _ => {
            warn!(uri = %request.uri(), "rejected request with invalid or missing token");
            Err(unauthorized_response())
        }
    }
}

/// Accepts both "Bearer TOKEN" and a bare "TOKEN"
fn provided_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get("Authorization")?.to_str().ok()?.trim();
    Some(header.strip_prefix("Bearer ").unwrap_or(header))
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "error": "Unauthorized - invalid or missing authentication token"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_provided_token_formats() {
        assert_eq!(provided_token(&headers("Bearer s3cret")), Some("s3cret"));
        assert_eq!(provided_token(&headers("s3cret")), Some("s3cret"));
        assert_eq!(provided_token(&HeaderMap::new()), None);
    }
}
