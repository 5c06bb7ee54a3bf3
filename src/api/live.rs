use axum::{Json, extract::State};
use std::sync::Arc;

use crate::models::LiveStream;

use super::{ApiResponse, AppState};

/// Live broadcast status; `data` is null when no live video is configured
/// or the lookup failed.
pub async fn live_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Option<LiveStream>>> {
    let live = state.channel.live_stream_info().await;
    Json(ApiResponse::success(live))
}
