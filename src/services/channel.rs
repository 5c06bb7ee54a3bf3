//! Channel content service: cache-aside access to the station's YouTube
//! data, with the parallel playlist aggregation behind the video feed.
//!
//! Every public operation is total from the caller's perspective. Upstream
//! failures degrade to stale data, the editorial fallback set, or an empty
//! result; they are reported through `tracing` and `metrics`, never as
//! errors. Availability trumps correctness for a content-display feature.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use metrics::counter;
use tracing::{debug, warn};

use crate::cache::Caches;
use crate::clients::YouTubeApi;
use crate::config::{CacheConfig, YouTubeConfig};
use crate::models::{Category, DashboardStats, LiveStream, Playlist, Video, fallback_videos};

/// Upstream cap on one playlist page request.
const MAX_PAGE_SIZE: usize = 20;

const PLAYLISTS_PAGE_SIZE: u32 = 25;

const RECENT_VIDEOS_IN_STATS: usize = 5;

pub struct ChannelService {
    api: Arc<dyn YouTubeApi>,
    caches: Arc<Caches>,
    youtube: YouTubeConfig,
    fetch_timeout: Duration,
    ttl: CacheTtls,
}

struct CacheTtls {
    videos: Duration,
    live: Duration,
    playlists: Duration,
    stats: Duration,
    channel_id: Duration,
}

impl ChannelService {
    #[must_use]
    pub fn new(
        api: Arc<dyn YouTubeApi>,
        caches: Arc<Caches>,
        youtube: YouTubeConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            api,
            caches,
            fetch_timeout: Duration::from_secs(youtube.fetch_timeout_seconds),
            ttl: CacheTtls {
                videos: Duration::from_secs(cache_config.videos_ttl_seconds),
                live: Duration::from_secs(cache_config.live_ttl_seconds),
                playlists: Duration::from_secs(cache_config.playlists_ttl_seconds),
                stats: Duration::from_secs(cache_config.stats_ttl_seconds),
                channel_id: Duration::from_secs(cache_config.channel_id_ttl_seconds),
            },
            youtube,
        }
    }

    /// Latest channel videos, at most `max_results` of them.
    ///
    /// Aggregates the configured playlists in parallel on a cache miss.
    /// When aggregation produces nothing (no API key, every playlist
    /// failed, or zero combined records) the fallback set is served
    /// instead, so the result is empty only when `max_results` is 0.
    pub async fn channel_videos(&self, max_results: usize) -> Vec<Video> {
        if max_results == 0 {
            return Vec::new();
        }

        let cache_key = format!("channel_videos_{max_results}");
        if let Some(videos) = self.caches.videos.get(&cache_key, self.ttl.videos) {
            counter!("lcatv_cache_hits_total", "cache" => "videos").increment(1);
            return videos;
        }
        counter!("lcatv_cache_misses_total", "cache" => "videos").increment(1);

        let mut videos = if self.youtube.api_key.is_empty() {
            debug!("No YouTube API key configured, serving fallback videos");
            self.fallback_set("no_api_key")
        } else {
            let aggregated = self.aggregate_playlists(max_results).await;
            if aggregated.is_empty() {
                self.fallback_set("no_results")
            } else {
                aggregated
            }
        };

        videos.truncate(max_results);
        self.caches.videos.set(cache_key, videos.clone());
        videos
    }

    /// Videos filtered to one category. Filtered views get their own cache
    /// entries since the per-category slices are requested independently.
    pub async fn videos_by_category(
        &self,
        category: Category,
        max_results: usize,
    ) -> Vec<Video> {
        let cache_key = format!("videos_category_{category}_{max_results}");
        if let Some(videos) = self.caches.videos.get(&cache_key, self.ttl.videos) {
            counter!("lcatv_cache_hits_total", "cache" => "videos").increment(1);
            return videos;
        }
        counter!("lcatv_cache_misses_total", "cache" => "videos").increment(1);

        let filtered: Vec<Video> = self
            .channel_videos(max_results)
            .await
            .into_iter()
            .filter(|v| v.category == category)
            .collect();

        self.caches.videos.set(cache_key, filtered.clone());
        filtered
    }

    /// Details of the station's permanent live broadcast, if configured
    /// and reachable. Only found broadcasts are cached.
    pub async fn live_stream_info(&self) -> Option<LiveStream> {
        let video_id = self.youtube.live_video_id.as_deref()?;
        if self.youtube.api_key.is_empty() {
            return None;
        }

        let cache_key = "live_stream_info";
        if let Some(live) = self.caches.live.get(cache_key, self.ttl.live) {
            counter!("lcatv_cache_hits_total", "cache" => "live").increment(1);
            return Some(live);
        }
        counter!("lcatv_cache_misses_total", "cache" => "live").increment(1);

        match self.api.live_details(video_id).await {
            Ok(Some(live)) => {
                self.caches.live.set(cache_key, live.clone());
                Some(live)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Live stream lookup failed: {e}");
                counter!("lcatv_youtube_fetch_failures_total", "kind" => "live").increment(1);
                None
            }
        }
    }

    /// The channel's playlists, empty on any failure.
    pub async fn playlists(&self) -> Vec<Playlist> {
        if self.youtube.api_key.is_empty() {
            return Vec::new();
        }

        let cache_key = "channel_playlists";
        if let Some(playlists) = self.caches.playlists.get(cache_key, self.ttl.playlists) {
            counter!("lcatv_cache_hits_total", "cache" => "playlists").increment(1);
            return playlists;
        }
        counter!("lcatv_cache_misses_total", "cache" => "playlists").increment(1);

        let Some(channel_id) = self.resolve_channel_id().await else {
            return Vec::new();
        };

        match self
            .api
            .channel_playlists(&channel_id, PLAYLISTS_PAGE_SIZE)
            .await
        {
            Ok(playlists) => {
                self.caches.playlists.set(cache_key, playlists.clone());
                playlists
            }
            Err(e) => {
                warn!(channel = %channel_id, "Playlist listing failed: {e}");
                counter!("lcatv_youtube_fetch_failures_total", "kind" => "playlists")
                    .increment(1);
                Vec::new()
            }
        }
    }

    /// Aggregate counters for the admin dashboard.
    pub async fn dashboard_stats(&self) -> DashboardStats {
        let cache_key = "dashboard_stats";
        if let Some(stats) = self.caches.stats.get(cache_key, self.ttl.stats) {
            counter!("lcatv_cache_hits_total", "cache" => "stats").increment(1);
            return stats;
        }
        counter!("lcatv_cache_misses_total", "cache" => "stats").increment(1);

        let videos = self.channel_videos(20).await;
        let playlists = self.playlists().await;
        let live = self.live_stream_info().await;

        let mut categories = BTreeMap::new();
        for video in &videos {
            *categories.entry(video.category).or_insert(0) += 1;
        }

        // ISO-8601 timestamps sort lexicographically.
        let mut recent_videos = videos.clone();
        recent_videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        recent_videos.truncate(RECENT_VIDEOS_IN_STATS);

        let stats = DashboardStats {
            total_videos: videos.len(),
            total_playlists: playlists.len(),
            is_live: live.as_ref().is_some_and(|l| l.is_live),
            concurrent_viewers: live.and_then(|l| l.concurrent_viewers),
            categories,
            recent_videos,
            generated_at: Utc::now(),
        };

        self.caches.stats.set(cache_key, stats.clone());
        stats
    }

    /// Fan out one page request per configured playlist with bounded
    /// concurrency, accumulate in completion order, stop once enough raw
    /// records arrived, then dedupe and truncate.
    ///
    /// Merge order across playlists is completion order and therefore
    /// non-deterministic run to run; order within one playlist page is the
    /// source order. A playlist that fails or exceeds the fetch deadline
    /// contributes nothing. Dropping the stream on early exit cancels the
    /// requests still in flight.
    async fn aggregate_playlists(&self, max_results: usize) -> Vec<Video> {
        let playlist_ids = &self.youtube.playlist_ids;
        if playlist_ids.is_empty() {
            return Vec::new();
        }

        let per_playlist = (max_results / playlist_ids.len()).clamp(1, MAX_PAGE_SIZE) as u32;

        let mut fetches = futures::stream::iter(playlist_ids.iter().cloned().map(|playlist_id| {
            let api = Arc::clone(&self.api);
            let deadline = self.fetch_timeout;
            async move {
                let result =
                    tokio::time::timeout(deadline, api.playlist_items(&playlist_id, per_playlist))
                        .await;
                (playlist_id, result)
            }
        }))
        .buffer_unordered(self.youtube.parallel_fetches);

        let mut raw: Vec<Video> = Vec::new();
        while let Some((playlist_id, result)) = fetches.next().await {
            match result {
                Ok(Ok(videos)) => {
                    raw.extend(videos);
                    if raw.len() >= max_results {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    warn!(playlist = %playlist_id, "Playlist fetch failed: {e}");
                    counter!("lcatv_youtube_fetch_failures_total", "kind" => "playlist")
                        .increment(1);
                }
                Err(_) => {
                    warn!(
                        playlist = %playlist_id,
                        "Playlist fetch timed out after {:?}", self.fetch_timeout
                    );
                    counter!("lcatv_youtube_fetch_failures_total", "kind" => "timeout")
                        .increment(1);
                }
            }
        }

        dedupe_and_truncate(raw, max_results)
    }

    async fn resolve_channel_id(&self) -> Option<String> {
        if let Some(id) = &self.youtube.channel_id {
            return Some(id.clone());
        }

        let handle = &self.youtube.channel_handle;
        let cache_key = format!("channel_id_{handle}");
        if let Some(id) = self.caches.channel_ids.get(&cache_key, self.ttl.channel_id) {
            return Some(id);
        }

        match self.api.channel_id_for_handle(handle).await {
            Ok(Some(id)) => {
                self.caches.channel_ids.set(cache_key, id.clone());
                Some(id)
            }
            Ok(None) => {
                warn!("No channel found for handle {handle}");
                None
            }
            Err(e) => {
                warn!("Channel id resolution failed: {e}");
                counter!("lcatv_youtube_fetch_failures_total", "kind" => "search").increment(1);
                None
            }
        }
    }

    fn fallback_set(&self, reason: &'static str) -> Vec<Video> {
        counter!("lcatv_fallback_served_total", "reason" => reason).increment(1);
        fallback_videos()
    }
}

/// Keep the first occurrence of each video id, in arrival order, capped at
/// `max_results`.
fn dedupe_and_truncate(videos: Vec<Video>, max_results: usize) -> Vec<Video> {
    let mut seen = HashSet::with_capacity(videos.len());
    let mut unique = Vec::new();

    for video in videos {
        if unique.len() == max_results {
            break;
        }
        if seen.insert(video.id.clone()) {
            unique.push(video);
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::YouTubeError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn video(id: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Video {id}"),
            description: String::new(),
            thumbnail: String::new(),
            published_at: "2025-01-01T00:00:00Z".to_string(),
            category: Category::Actualites,
            channel_title: "LCA TV".to_string(),
            view_count: "0".to_string(),
            like_count: "0".to_string(),
            comment_count: "0".to_string(),
        }
    }

    #[derive(Default)]
    struct StubApi {
        pages: HashMap<String, Vec<Video>>,
        failing: HashSet<String>,
        slow: HashSet<String>,
        /// Return full pages regardless of the requested page size, like a
        /// misbehaving upstream.
        ignore_page_size: bool,
        playlist_calls: AtomicUsize,
    }

    impl StubApi {
        fn with_page(mut self, playlist_id: &str, ids: &[&str]) -> Self {
            self.pages
                .insert(playlist_id.to_string(), ids.iter().map(|id| video(id)).collect());
            self
        }

        fn with_failing(mut self, playlist_id: &str) -> Self {
            self.failing.insert(playlist_id.to_string());
            self
        }

        fn with_slow(mut self, playlist_id: &str) -> Self {
            self.slow.insert(playlist_id.to_string());
            self
        }
    }

    #[async_trait]
    impl YouTubeApi for StubApi {
        async fn playlist_items(
            &self,
            playlist_id: &str,
            max_results: u32,
        ) -> Result<Vec<Video>, YouTubeError> {
            self.playlist_calls.fetch_add(1, Ordering::SeqCst);

            if self.slow.contains(playlist_id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(playlist_id) {
                return Err(YouTubeError::Status {
                    endpoint: "playlistItems",
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                });
            }

            let page = self.pages.get(playlist_id).cloned().unwrap_or_default();
            if self.ignore_page_size {
                return Ok(page);
            }
            Ok(page.into_iter().take(max_results as usize).collect())
        }

        async fn live_details(
            &self,
            _video_id: &str,
        ) -> Result<Option<LiveStream>, YouTubeError> {
            Ok(None)
        }

        async fn channel_playlists(
            &self,
            _channel_id: &str,
            _max_results: u32,
        ) -> Result<Vec<Playlist>, YouTubeError> {
            Ok(Vec::new())
        }

        async fn channel_id_for_handle(
            &self,
            _handle: &str,
        ) -> Result<Option<String>, YouTubeError> {
            Ok(None)
        }
    }

    fn service(api: StubApi, playlist_ids: &[&str]) -> (ChannelService, Arc<StubApi>) {
        let api = Arc::new(api);
        let youtube = YouTubeConfig {
            api_key: "test-key".to_string(),
            playlist_ids: playlist_ids.iter().map(ToString::to_string).collect(),
            fetch_timeout_seconds: 1,
            ..YouTubeConfig::default()
        };
        let svc = ChannelService::new(
            api.clone(),
            Arc::new(Caches::new(100)),
            youtube,
            &CacheConfig::default(),
        );
        (svc, api)
    }

    fn keyless_service(api: StubApi, playlist_ids: &[&str]) -> (ChannelService, Arc<StubApi>) {
        let api = Arc::new(api);
        let youtube = YouTubeConfig {
            playlist_ids: playlist_ids.iter().map(ToString::to_string).collect(),
            ..YouTubeConfig::default()
        };
        let svc = ChannelService::new(
            api.clone(),
            Arc::new(Caches::new(100)),
            youtube,
            &CacheConfig::default(),
        );
        (svc, api)
    }

    fn sorted_ids(videos: &[Video]) -> Vec<&str> {
        let mut ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_merges_and_dedupes_across_playlists() {
        // P1 -> [a, b], P2 -> [b, c], P3 fails: result is exactly {a, b, c}.
        let api = StubApi::default()
            .with_page("P1", &["a", "b"])
            .with_page("P2", &["b", "c"])
            .with_failing("P3");
        let (svc, _) = service(api, &["P1", "P2", "P3"]);

        let videos = svc.channel_videos(10).await;
        assert_eq!(sorted_ids(&videos), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_partial_failures_keep_surviving_playlists() {
        let api = StubApi::default()
            .with_page("P1", &["a"])
            .with_failing("P2")
            .with_page("P3", &["b"])
            .with_failing("P4")
            .with_page("P5", &["c"]);
        let (svc, _) = service(api, &["P1", "P2", "P3", "P4", "P5"]);

        let videos = svc.channel_videos(10).await;
        assert_eq!(sorted_ids(&videos), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_all_playlists_failing_serves_fallback() {
        let api = StubApi::default()
            .with_failing("P1")
            .with_failing("P2");
        let (svc, _) = service(api, &["P1", "P2"]);

        let videos = svc.channel_videos(10).await;
        assert_eq!(
            sorted_ids(&videos),
            sorted_ids(&fallback_videos()),
            "total failure must substitute the fallback set"
        );
    }

    #[tokio::test]
    async fn test_empty_playlists_serve_fallback() {
        let api = StubApi::default().with_page("P1", &[]).with_page("P2", &[]);
        let (svc, _) = service(api, &["P1", "P2"]);

        let videos = svc.channel_videos(4).await;
        assert_eq!(videos.len(), 4, "fallback set, truncated to max_results");
    }

    #[tokio::test]
    async fn test_output_is_bounded() {
        // Upstream ignores the requested page size and floods us anyway.
        let many: Vec<String> = (0..30).map(|i| format!("vid{i:02}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let mut api = StubApi::default().with_page("P1", &refs);
        api.ignore_page_size = true;
        let (svc, _) = service(api, &["P1"]);

        let videos = svc.channel_videos(7).await;
        assert_eq!(videos.len(), 7);
    }

    #[tokio::test]
    async fn test_output_is_bounded_below_playlist_count() {
        // Five playlists at one record each still respect max_results=3.
        let api = StubApi::default()
            .with_page("P1", &["a"])
            .with_page("P2", &["b"])
            .with_page("P3", &["c"])
            .with_page("P4", &["d"])
            .with_page("P5", &["e"]);
        let (svc, _) = service(api, &["P1", "P2", "P3", "P4", "P5"]);

        let videos = svc.channel_videos(3).await;
        assert_eq!(videos.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_max_results_returns_empty_without_fetching() {
        let api = StubApi::default().with_page("P1", &["a"]);
        let (svc, api) = service(api, &["P1"]);

        assert!(svc.channel_videos(0).await.is_empty());
        assert_eq!(api.playlist_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cached_result_skips_refetch() {
        let api = StubApi::default().with_page("P1", &["a", "b"]);
        let (svc, api) = service(api, &["P1"]);

        let first = svc.channel_videos(5).await;
        let calls_after_first = api.playlist_calls.load(Ordering::SeqCst);
        let second = svc.channel_videos(5).await;

        assert_eq!(sorted_ids(&first), sorted_ids(&second));
        assert_eq!(api.playlist_calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn test_no_api_key_serves_fallback_without_calls() {
        let api = StubApi::default().with_page("P1", &["a"]);
        let (svc, api) = keyless_service(api, &["P1"]);

        let videos = svc.channel_videos(10).await;
        assert_eq!(sorted_ids(&videos), sorted_ids(&fallback_videos()));
        assert_eq!(api.playlist_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_is_truncated_to_max_results() {
        let (svc, _) = keyless_service(StubApi::default(), &["P1"]);
        let videos = svc.channel_videos(2).await;
        assert_eq!(videos.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_playlist_contributes_nothing() {
        let api = StubApi::default()
            .with_page("P1", &["a"])
            .with_slow("P2")
            .with_page("P3", &["b"]);
        let (svc, _) = service(api, &["P1", "P2", "P3"]);

        let videos = svc.channel_videos(10).await;
        assert_eq!(sorted_ids(&videos), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_early_termination_skips_remaining_playlists() {
        let api = StubApi::default()
            .with_page("P1", &["a"])
            .with_page("P2", &["b"])
            .with_page("P3", &["c"])
            .with_page("P4", &["d"])
            .with_page("P5", &["e"]);
        let (svc, api) = service(api, &["P1", "P2", "P3", "P4", "P5"]);

        // Two completions cover max_results=2, so with three concurrent
        // slots the fifth playlist is never requested.
        let videos = svc.channel_videos(2).await;
        assert_eq!(videos.len(), 2);
        assert!(api.playlist_calls.load(Ordering::SeqCst) < 5);
    }

    #[tokio::test]
    async fn test_videos_by_category_filters() {
        let mut sport = video("sportvid");
        sport.category = Category::Sport;
        let api = StubApi {
            pages: HashMap::from([("P1".to_string(), vec![video("newsvid"), sport])]),
            ..StubApi::default()
        };
        let (svc, _) = service(api, &["P1"]);

        let videos = svc.videos_by_category(Category::Sport, 10).await;
        assert_eq!(sorted_ids(&videos), vec!["sportvid"]);
    }

    #[tokio::test]
    async fn test_dashboard_stats_counts_categories() {
        let api = StubApi::default().with_page("P1", &["a", "b"]);
        let (svc, _) = service(api, &["P1"]);

        let stats = svc.dashboard_stats().await;
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.categories.get(&Category::Actualites), Some(&2));
        assert!(!stats.is_live);
        assert!(stats.recent_videos.len() <= RECENT_VIDEOS_IN_STATS);
    }

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let videos = vec![video("a"), video("b"), video("a"), video("c"), video("b")];
        let unique = dedupe_and_truncate(videos, 10);
        let ids: Vec<&str> = unique.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedupe_truncates() {
        let videos = vec![video("a"), video("b"), video("c")];
        assert_eq!(dedupe_and_truncate(videos, 2).len(), 2);
    }
}
