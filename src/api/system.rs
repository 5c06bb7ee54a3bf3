//! System endpoints: status, dashboard statistics, and the admin cache
//! flush.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::info;

use crate::models::DashboardStats;

use super::{ApiError, ApiResponse, AppState, CacheClearResult, SystemStatus};

/// `GET /api/system/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let config = state.config.read().await;

    Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        cache_entries: state.caches.total_entries(),
        youtube_api_configured: !config.youtube.api_key.is_empty(),
        metrics_enabled: config.observability.metrics_enabled,
    }))
}

/// `GET /api/dashboard-stats`
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<DashboardStats>> {
    let stats = state.channel.dashboard_stats().await;
    Json(ApiResponse::success(stats))
}

/// `POST /api/cache/clear`
///
/// Flushes every response cache. Requires the configured admin key in
/// `X-Api-Key`; refused entirely when no key is configured.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<CacheClearResult>>, ApiError> {
    let admin_key = {
        let config = state.config.read().await;
        config.server.admin_api_key.clone()
    };

    let Some(admin_key) = admin_key else {
        return Err(ApiError::unauthorized(
            "Admin API key is not configured; cache flush is disabled",
        ));
    };

    let provided = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if provided != Some(admin_key.as_str()) {
        return Err(ApiError::unauthorized("Invalid or missing API key"));
    }

    state.caches.clear_all();
    info!("All response caches flushed by admin request");

    Ok(Json(ApiResponse::success(CacheClearResult {
        message: "Cache cleared successfully".to_string(),
    })))
}
