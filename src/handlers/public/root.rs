use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::middleware::ApiResponse;

/// GET / - Service descriptor
pub async fn root() -> impl IntoResponse {
    ApiResponse::success(json!({
        "name": "Schoolbox API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "School signup, site publishing and logo-driven brand theming",
        "endpoints": {
            "health": "/health (public)",
            "colors": "/api/get-colors (public)",
            "sites": "/sites/:slug (public)",
            "auth": "/api/auth/whoami (protected)",
            "schools": "/api/schools, /api/school (protected)",
            "theme": "/api/update-and-check-contrast, /api/school/theme[/recompute], /api/school/logo (protected)",
            "site": "/api/school/site (protected)",
            "upload": "/api/upload (protected)"
        }
    }))
}

/// GET /health - Store reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
