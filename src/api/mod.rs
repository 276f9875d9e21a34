pub mod sessions;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::AppState;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Routes the voice runtime calls during a session.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(sessions::handle_start))
        .route("/api/sessions/{id}/tools", post(sessions::handle_tool))
        .route("/api/sessions/{id}/end", post(sessions::handle_end))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    if expected_token.is_empty() {
        tracing::warn!("API token not configured, rejecting request");
        return Err(error(
            StatusCode::SERVICE_UNAVAILABLE,
            "API token not configured",
        ));
    }

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected_token => Ok(()),
        _ => {
            tracing::warn!("Unauthorized API request");
            Err(error(
                StatusCode::UNAUTHORIZED,
                "Invalid or missing bearer token",
            ))
        }
    }
}
