//! In-memory TTL caches for upstream API responses.
//!
//! Everything here is process-local and lost on restart. Each cache is a
//! string-keyed map behind a single mutex; the TTL is supplied per read so
//! one cache can serve entries with different freshness requirements.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::{DashboardStats, LiveStream, Playlist, Video};

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// TTL cache with a bounded entry count.
///
/// All operations take the same exclusive lock for their full duration.
/// That serializes cache traffic, which is fine at the request rates this
/// service sees; none of the operations can fail.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    max_entries: usize,
}

impl<V: Clone> TtlCache<V> {
    /// `max_entries` bounds memory under long uptimes: keys are
    /// parameterized by query shape (result size, category), so cardinality
    /// grows without bound otherwise.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the stored value if it is younger than `ttl`. An expired
    /// entry is removed on the way out; callers cannot distinguish
    /// "never stored" from "expired".
    pub fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `value` with the current timestamp, overwriting any prior
    /// entry. When the cache is full, the oldest 20% of entries (by store
    /// time) are evicted first.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if entries.len() >= self.max_entries {
            Self::evict_oldest(&mut entries);
        }

        entries.insert(
            key.into(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest(entries: &mut HashMap<String, Entry<V>>) {
        let remove_count = (entries.len() / 5).max(1);

        let mut by_age: Vec<(String, Instant)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.stored_at))
            .collect();
        by_age.sort_by_key(|(_, stored_at)| *stored_at);

        for (key, _) in by_age.into_iter().take(remove_count) {
            entries.remove(&key);
        }
    }
}

/// One cache per payload family, built once and handed to whoever needs
/// them. The admin flush endpoint drops all of them at once.
pub struct Caches {
    pub videos: TtlCache<Vec<Video>>,
    pub live: TtlCache<LiveStream>,
    pub playlists: TtlCache<Vec<Playlist>>,
    pub stats: TtlCache<DashboardStats>,
    pub channel_ids: TtlCache<String>,
}

impl Caches {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            videos: TtlCache::new(max_entries),
            live: TtlCache::new(max_entries),
            playlists: TtlCache::new(max_entries),
            stats: TtlCache::new(max_entries),
            channel_ids: TtlCache::new(max_entries),
        }
    }

    pub fn clear_all(&self) {
        self.videos.clear();
        self.live.clear();
        self.playlists.clear();
        self.stats.clear();
        self.channel_ids.clear();
    }

    /// Total entry count across every cache, for the status endpoint.
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.videos.len()
            + self.live.len()
            + self.playlists.len()
            + self.stats.len()
            + self.channel_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_get_returns_fresh_value_repeatedly() {
        let cache = TtlCache::new(100);
        cache.set("videos", vec![1, 2, 3]);

        assert_eq!(cache.get("videos", Duration::from_secs(60)), Some(vec![1, 2, 3]));
        assert_eq!(cache.get("videos", Duration::from_secs(60)), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_missing_key_is_absent() {
        let cache: TtlCache<String> = TtlCache::new(100);
        assert_eq!(cache.get("nope", Duration::from_secs(60)), None);
    }

    #[test]
    fn test_expired_entry_is_absent_and_stays_absent() {
        let cache = TtlCache::new(100);
        cache.set("key", "value".to_string());

        sleep(Duration::from_millis(30));
        assert_eq!(cache.get("key", Duration::from_millis(10)), None);

        // The stale value must not resurrect under a longer TTL either:
        // the expired read already removed it.
        assert_eq!(cache.get("key", Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_overwrites_and_refreshes_timestamp() {
        let cache = TtlCache::new(100);
        cache.set("key", 1);
        sleep(Duration::from_millis(20));
        cache.set("key", 2);

        assert_eq!(cache.get("key", Duration::from_millis(15)), Some(2));
    }

    #[test]
    fn test_per_read_ttl() {
        let cache = TtlCache::new(100);
        cache.set("key", 1);
        sleep(Duration::from_millis(20));

        // Same entry, two freshness requirements.
        assert_eq!(cache.get("key", Duration::from_secs(60)), Some(1));
        assert_eq!(cache.get("key", Duration::from_millis(5)), None);
    }

    #[test]
    fn test_full_cache_evicts_oldest_fifth() {
        let cache = TtlCache::new(10);
        for i in 0..10 {
            cache.set(format!("key{i}"), i);
            // Distinct store times so eviction order is well defined.
            sleep(Duration::from_millis(2));
        }

        cache.set("newest", 99);

        // Oldest 20% of the 10 entries (key0, key1) made room.
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.get("key0", ttl), None);
        assert_eq!(cache.get("key1", ttl), None);
        assert_eq!(cache.get("key2", ttl), Some(2));
        assert_eq!(cache.get("newest", ttl), Some(99));
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn test_clear_drops_everything() {
        let cache = TtlCache::new(100);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.clear();

        assert_eq!(cache.get("a", Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_all_flushes_every_cache() {
        let caches = Caches::new(100);
        caches.videos.set("channel_videos_10", Vec::new());
        caches.channel_ids.set("channel_id_@LCATV", "UC123".to_string());
        assert_eq!(caches.total_entries(), 2);

        caches.clear_all();
        assert_eq!(caches.total_entries(), 0);
    }
}
