use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tokio::sync::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::cache::Caches;
use crate::clients::{YouTubeClient, build_shared_http_client};
use crate::config::Config;
use crate::services::ChannelService;

mod error;
mod live;
mod observability;
mod playlists;
mod system;
mod types;
mod videos;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,

    pub caches: Arc<Caches>,

    pub channel: Arc<ChannelService>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

pub fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let http_client = build_shared_http_client(config.youtube.request_timeout_seconds)?;
    let youtube = Arc::new(YouTubeClient::new(
        http_client,
        config.youtube.base_url.clone(),
        config.youtube.api_key.clone(),
    ));

    let caches = Arc::new(Caches::new(config.cache.max_entries));
    let channel = Arc::new(ChannelService::new(
        youtube,
        caches.clone(),
        config.youtube.clone(),
        &config.cache,
    ));

    Ok(Arc::new(AppState {
        config: Arc::new(RwLock::new(config)),
        caches,
        channel,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config.read().await;
        config.server.cors_allowed_origins.clone()
    };

    let api_routes = Router::new()
        .route("/videos", get(videos::list_videos))
        .route(
            "/videos/category/{category}",
            get(videos::videos_by_category),
        )
        .route("/live-status", get(live::live_status))
        .route("/playlists", get(playlists::list_playlists))
        .route("/dashboard-stats", get(system::dashboard_stats))
        .route("/system/status", get(system::get_status))
        .route("/cache/clear", post(system::clear_cache));

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_metrics))
}
