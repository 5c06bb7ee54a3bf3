//! Thin client for the YouTube Data API v3.
//!
//! The API is treated as an opaque HTTP JSON service: items whose shape
//! deviates from what we need (no `resourceId.videoId`, no snippet) are
//! skipped rather than failing the whole page.

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{Category, LiveStream, Playlist, Video, truncate_text};

const DESCRIPTION_MAX_CHARS: usize = 200;
const PLAYLIST_DESCRIPTION_MAX_CHARS: usize = 150;

#[derive(Debug, Error)]
pub enum YouTubeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
}

/// Upstream operations the channel service depends on. Split out as a
/// trait so the aggregation logic can be exercised against a stub.
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    /// One page of a playlist, already mapped to domain records.
    /// Source order within the page is preserved.
    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<Video>, YouTubeError>;

    /// Live broadcast details for a single video id, `None` when the
    /// video does not exist.
    async fn live_details(&self, video_id: &str) -> Result<Option<LiveStream>, YouTubeError>;

    async fn channel_playlists(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<Playlist>, YouTubeError>;

    /// Resolve a channel handle (e.g. `@LCATV`) to a channel id via the
    /// search endpoint.
    async fn channel_id_for_handle(
        &self,
        handle: &str,
    ) -> Result<Option<String>, YouTubeError>;
}

#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeClient {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T, YouTubeError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(YouTubeError::Status {
                endpoint,
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl YouTubeApi for YouTubeClient {
    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<Video>, YouTubeError> {
        let max_results = max_results.to_string();
        let response: PlaylistItemsResponse = self
            .get_json(
                "playlistItems",
                &[
                    ("part", "snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", &max_results),
                ],
            )
            .await?;

        Ok(videos_from_items(response.items))
    }

    async fn live_details(&self, video_id: &str) -> Result<Option<LiveStream>, YouTubeError> {
        let response: VideosResponse = self
            .get_json(
                "videos",
                &[("part", "snippet,liveStreamingDetails"), ("id", video_id)],
            )
            .await?;

        Ok(response.items.into_iter().next().map(live_stream_from_item))
    }

    async fn channel_playlists(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<Playlist>, YouTubeError> {
        let max_results = max_results.to_string();
        let response: PlaylistsResponse = self
            .get_json(
                "playlists",
                &[
                    ("part", "snippet,contentDetails"),
                    ("channelId", channel_id),
                    ("maxResults", &max_results),
                ],
            )
            .await?;

        Ok(response.items.into_iter().map(playlist_from_item).collect())
    }

    async fn channel_id_for_handle(
        &self,
        handle: &str,
    ) -> Result<Option<String>, YouTubeError> {
        let response: SearchResponse = self
            .get_json(
                "search",
                &[("part", "snippet"), ("q", handle), ("type", "channel")],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.id.and_then(|id| id.channel_id)))
    }
}

// Wire format. Only the fields we read; everything load-bearing is Option
// so one malformed item never poisons a page.

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistItem {
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    published_at: Option<String>,
    channel_title: Option<String>,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    /// Best available of high/medium/default.
    fn best_url(&self) -> String {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .next()
            .map(|t| t.url.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    live_broadcast_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    scheduled_start_time: Option<String>,
    actual_start_time: Option<String>,
    concurrent_viewers: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistsResponse {
    #[serde(default)]
    items: Vec<PlaylistResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    id: String,
    snippet: Option<PlaylistSnippet>,
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    item_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchItemId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    channel_id: Option<String>,
}

pub(crate) fn videos_from_items(items: Vec<PlaylistItem>) -> Vec<Video> {
    let mut videos = Vec::with_capacity(items.len());

    for item in items {
        let Some(snippet) = item.snippet else {
            skip_item("missing snippet");
            continue;
        };
        let Some(video_id) = snippet.resource_id.as_ref().and_then(|r| r.video_id.clone())
        else {
            skip_item("missing resourceId.videoId");
            continue;
        };
        let Some(title) = snippet.title else {
            skip_item("missing title");
            continue;
        };

        let category = Category::from_title(&title);
        videos.push(Video {
            id: video_id,
            description: truncate_text(&snippet.description, DESCRIPTION_MAX_CHARS),
            thumbnail: snippet.thumbnails.best_url(),
            published_at: snippet.published_at.unwrap_or_default(),
            category,
            channel_title: snippet
                .channel_title
                .unwrap_or_else(|| "LCA TV".to_string()),
            view_count: "0".to_string(),
            like_count: "0".to_string(),
            comment_count: "0".to_string(),
            title,
        });
    }

    videos
}

fn live_stream_from_item(item: VideoItem) -> LiveStream {
    let snippet = item.snippet.unwrap_or_else(|| VideoSnippet {
        title: String::new(),
        description: String::new(),
        thumbnails: Thumbnails::default(),
        live_broadcast_content: None,
    });
    let details = item.live_streaming_details;

    LiveStream {
        id: item.id,
        is_live: snippet.live_broadcast_content.as_deref() == Some("live"),
        title: snippet.title,
        description: snippet.description,
        thumbnail: snippet.thumbnails.best_url(),
        scheduled_start: details.as_ref().and_then(|d| d.scheduled_start_time.clone()),
        actual_start: details.as_ref().and_then(|d| d.actual_start_time.clone()),
        concurrent_viewers: details.and_then(|d| d.concurrent_viewers),
    }
}

fn playlist_from_item(item: PlaylistResource) -> Playlist {
    let snippet = item.snippet;

    Playlist {
        id: item.id,
        title: snippet.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
        description: truncate_text(
            snippet.as_ref().map_or("", |s| s.description.as_str()),
            PLAYLIST_DESCRIPTION_MAX_CHARS,
        ),
        thumbnail: snippet
            .as_ref()
            .map(|s| s.thumbnails.best_url())
            .unwrap_or_default(),
        video_count: item
            .content_details
            .and_then(|d| d.item_count)
            .unwrap_or(0),
        published_at: snippet.and_then(|s| s.published_at).unwrap_or_default(),
    }
}

fn skip_item(reason: &'static str) {
    debug!("Skipping playlist item: {reason}");
    counter!("lcatv_youtube_items_skipped_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> PlaylistItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_maps_playlist_item_to_video() {
        let videos = videos_from_items(vec![item(json!({
            "snippet": {
                "title": "Journal de 20h",
                "description": "Le tour de l'actualité.",
                "publishedAt": "2025-03-01T20:00:00Z",
                "channelTitle": "LCA TV",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/vi/abc/default.jpg"},
                    "high": {"url": "https://i.ytimg.com/vi/abc/hqdefault.jpg"}
                },
                "resourceId": {"videoId": "abcdefghijk"}
            }
        }))]);

        assert_eq!(videos.len(), 1);
        let video = &videos[0];
        assert_eq!(video.id, "abcdefghijk");
        assert_eq!(video.category, Category::Actualites);
        assert_eq!(video.thumbnail, "https://i.ytimg.com/vi/abc/hqdefault.jpg");
        assert_eq!(video.view_count, "0");
    }

    #[test]
    fn test_item_without_video_id_is_skipped() {
        let videos = videos_from_items(vec![
            item(json!({"snippet": {"title": "Sans id", "resourceId": {}}})),
            item(json!({"snippet": null})),
            item(json!({
                "snippet": {
                    "title": "Match des Étalons",
                    "publishedAt": "2025-03-02T21:00:00Z",
                    "resourceId": {"videoId": "wwwwwwwwwww"}
                }
            })),
        ]);

        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "wwwwwwwwwww");
        assert_eq!(videos[0].category, Category::Sport);
    }

    #[test]
    fn test_long_description_is_truncated() {
        let long = "x".repeat(500);
        let videos = videos_from_items(vec![item(json!({
            "snippet": {
                "title": "Emission",
                "description": long,
                "publishedAt": "2025-03-01T10:00:00Z",
                "resourceId": {"videoId": "aaaaaaaaaaa"}
            }
        }))]);

        assert!(videos[0].description.chars().count() <= 200);
        assert!(videos[0].description.ends_with("..."));
    }

    #[test]
    fn test_thumbnail_fallback_order() {
        let thumbs: Thumbnails = serde_json::from_value(json!({
            "medium": {"url": "medium.jpg"},
            "default": {"url": "default.jpg"}
        }))
        .unwrap();
        assert_eq!(thumbs.best_url(), "medium.jpg");

        let none: Thumbnails = serde_json::from_value(json!({})).unwrap();
        assert_eq!(none.best_url(), "");
    }

    #[test]
    fn test_live_item_maps_broadcast_state() {
        let item: VideoItem = serde_json::from_value(json!({
            "id": "livevideoid",
            "snippet": {
                "title": "LCA TV en direct",
                "description": "Le direct de la chaîne",
                "liveBroadcastContent": "live",
                "thumbnails": {"high": {"url": "live.jpg"}}
            },
            "liveStreamingDetails": {
                "actualStartTime": "2025-03-01T08:00:00Z",
                "concurrentViewers": "1234"
            }
        }))
        .unwrap();

        let live = live_stream_from_item(item);
        assert!(live.is_live);
        assert_eq!(live.concurrent_viewers.as_deref(), Some("1234"));
        assert_eq!(live.scheduled_start, None);
    }

    #[test]
    fn test_playlist_resource_maps_counts() {
        let resource: PlaylistResource = serde_json::from_value(json!({
            "id": "PLx",
            "snippet": {
                "title": "Journal",
                "description": "Toutes les éditions",
                "publishedAt": "2024-01-01T00:00:00Z",
                "thumbnails": {}
            },
            "contentDetails": {"itemCount": 42}
        }))
        .unwrap();

        let playlist = playlist_from_item(resource);
        assert_eq!(playlist.video_count, 42);
        assert_eq!(playlist.title, "Journal");
    }
}
