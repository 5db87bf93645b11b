//! Route table and router construction.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use voicegate_core::CorsConfig;

use crate::bootstrap::GatewayContext;
use crate::bridge::voice_ws;
use crate::state::AppState;

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/stats", get(sessions_stats))
        .route("/voice/audio", get(voice_ws))
}

/// Build the router with the WebSocket bridge and ambient HTTP surface.
pub fn create_router(ctx: Arc<GatewayContext>, cors_config: &CorsConfig) -> Router {
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes().with_state(ctx).layer(cors))
}

/// As `create_router`, but falls back to serving static assets (with SPA
/// fallback to `index.html`) for any path the API router does not match.
pub fn create_spa_router<P: AsRef<Path>>(ctx: Arc<GatewayContext>, static_dir: P, cors_config: &CorsConfig) -> Router {
    let static_path = static_dir.as_ref();
    let index_path = static_path.join("index.html");
    let serve_dir = ServeDir::new(static_path).fallback(ServeFile::new(&index_path));

    create_router(ctx, cors_config).fallback_service(serve_dir)
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(json!({"status": "ok"}))
}

async fn sessions_stats(axum::extract::State(state): axum::extract::State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(json!({"active_sessions": state.lifecycle.registry().session_count()}))
}
