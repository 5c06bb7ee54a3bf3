use axum::{Json, extract::State};
use std::sync::Arc;

use crate::models::Playlist;

use super::{ApiResponse, AppState};

pub async fn list_playlists(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<Playlist>>> {
    let playlists = state.channel.playlists().await;
    Json(ApiResponse::success(playlists))
}
