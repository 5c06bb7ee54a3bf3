use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub youtube: YouTubeConfig,

    pub cache: CacheConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Key required (via `X-Api-Key`) for admin operations such as the
    /// cache flush. Unset means those endpoints are refused outright.
    pub admin_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5005,
            cors_allowed_origins: vec![
                "http://localhost:5005".to_string(),
                "http://127.0.0.1:5005".to_string(),
            ],
            admin_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Data API key. Empty means no live fetches: the service serves the
    /// editorial fallback set instead. Overridable via the
    /// `LCATV_YOUTUBE_API_KEY` or `YOUTUBE_API_KEY` environment variables.
    pub api_key: String,

    pub base_url: String,

    /// Channel id for playlist listing. When unset it is resolved from
    /// `channel_handle` through the search endpoint and cached.
    pub channel_id: Option<String>,

    pub channel_handle: String,

    /// Video id of the permanent live broadcast, if any.
    pub live_video_id: Option<String>,

    /// Playlists aggregated into the channel video feed.
    pub playlist_ids: Vec<String>,

    /// Concurrent playlist fetches per aggregation.
    pub parallel_fetches: usize,

    /// Deadline for one playlist fetch. A fetch past this contributes
    /// nothing; the in-flight request is cancelled, not abandoned.
    pub fetch_timeout_seconds: u64,

    /// Overall timeout applied to every request on the shared HTTP client.
    pub request_timeout_seconds: u64,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            channel_id: None,
            channel_handle: "@LCATV".to_string(),
            live_video_id: None,
            playlist_ids: vec![
                "PLk5BkfzB9R2y_GaeShMuKrdQAR-eGn86S".to_string(),
                "PLk5BkfzB9R2xqyMzMrGs4Z0uMxZMW2EQe".to_string(),
                "PLk5BkfzB9R2xJVGaQXQW0Q8yxwFPEY3k5".to_string(),
                "PLk5BkfzB9R2wMXgDqP_apnJc7iq8p2ML2".to_string(),
                "PLk5BkfzB9R2z1LpmM6ZNkSjhJeUCcjcH6".to_string(),
            ],
            parallel_fetches: 3,
            fetch_timeout_seconds: 5,
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry bound per cache; the oldest 20% are evicted once reached.
    pub max_entries: usize,

    pub videos_ttl_seconds: u64,

    pub live_ttl_seconds: u64,

    pub playlists_ttl_seconds: u64,

    pub stats_ttl_seconds: u64,

    pub channel_id_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            videos_ttl_seconds: 600,
            live_ttl_seconds: 60,
            playlists_ttl_seconds: 1800,
            stats_ttl_seconds: 300,
            channel_id_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            youtube: YouTubeConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            info!("Loading config from: {}", path.display());
            Self::load_from_path(path)?
        } else {
            Self::load_from_search_paths()?
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_search_paths() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        for var in ["LCATV_YOUTUBE_API_KEY", "YOUTUBE_API_KEY"] {
            if let Ok(key) = std::env::var(var)
                && !key.is_empty()
            {
                self.youtube.api_key = key;
                break;
            }
        }

        if let Ok(key) = std::env::var("LCATV_ADMIN_API_KEY")
            && !key.is_empty()
        {
            self.server.admin_api_key = Some(key);
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("lcatv").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".lcatv").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.youtube.parallel_fetches == 0 {
            anyhow::bail!("youtube.parallel_fetches must be > 0");
        }

        if !self.youtube.api_key.is_empty() && self.youtube.playlist_ids.is_empty() {
            anyhow::bail!("youtube.playlist_ids cannot be empty when an API key is set");
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be > 0");
        }

        Ok(())
    }
}
