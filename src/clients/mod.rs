pub mod youtube;

pub use youtube::{YouTubeApi, YouTubeClient, YouTubeError};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// Reused across all upstream requests to enable connection pooling and
/// avoid socket exhaustion.
pub fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent("LCA-TV-Website/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}
