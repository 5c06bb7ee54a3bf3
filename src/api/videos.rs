use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Category, Video};

use super::{ApiError, ApiResponse, AppState};

const DEFAULT_LIMIT: usize = 30;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct VideosQuery {
    pub limit: Option<usize>,
}

impl VideosQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideosQuery>,
) -> Json<ApiResponse<Vec<Video>>> {
    let videos = state.channel.channel_videos(query.limit()).await;
    Json(ApiResponse::success(videos))
}

pub async fn videos_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(query): Query<VideosQuery>,
) -> Result<Json<ApiResponse<Vec<Video>>>, ApiError> {
    let category: Category = category
        .parse()
        .map_err(|e: crate::models::UnknownCategory| ApiError::validation(e.to_string()))?;

    let videos = state
        .channel
        .videos_by_category(category, query.limit())
        .await;

    Ok(Json(ApiResponse::success(videos)))
}
