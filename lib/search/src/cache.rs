use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use waypoint_config::search::CacheConfig;

use crate::query::{ResourceType, SearchQuery};
use crate::result::SearchResponse;

/// Extra entries evicted past capacity so cleanups don't run back-to-back.
const CLEANUP_SLACK: usize = 10;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: SearchResponse,
    created_at: Instant,
    expires_at: Option<Instant>,
    resource_types: HashSet<ResourceType>,
    last_accessed: Instant,
    access_count: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Resource type → keys of entries that touched it.
    resource_index: HashMap<ResourceType, HashSet<String>>,
}

/// Cache statistics, as surfaced through the search tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub resource_counts: HashMap<String, usize>,
    pub avg_age_seconds: f64,
    pub enabled: bool,
    pub max_size: usize,
    pub ttl_seconds: u64,
}

/// Keyed storage of search responses.
///
/// Keys are digests of the canonicalized query. Entries expire after a TTL,
/// and inserts past capacity trigger a three-phase cleanup: expired entries
/// first, then entries accessed fewer than `min_access_count` times, then
/// least-recently-accessed entries down to capacity minus a small slack.
pub struct SearchCache {
    options: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl SearchCache {
    pub fn new(options: CacheConfig) -> Self {
        debug!(
            "Search cache initialized (enabled: {}, ttl: {}s, max_size: {})",
            options.enabled, options.ttl_seconds, options.max_size
        );
        Self {
            options,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Canonical digest of a query: serialize, which sorts object keys, and
    /// hash the result.
    pub fn hash_query(query: &SearchQuery) -> String {
        let canonical = serde_json::to_value(query)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{digest:x}")
    }

    pub fn get(&self, query: &SearchQuery) -> Option<SearchResponse> {
        if !self.options.enabled {
            return None;
        }

        let key = Self::hash_query(query);
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        let expired = match inner.entries.get(&key) {
            None => return None,
            Some(entry) => entry
                .expires_at
                .map(|at| Instant::now() > at)
                .unwrap_or(false),
        };
        if expired {
            debug!("Cache entry expired for query {key}");
            remove_entry(&mut inner, &key);
            return None;
        }

        let entry = inner.entries.get_mut(&key)?;
        entry.last_accessed = Instant::now();
        entry.access_count += 1;
        debug!(
            "Cache hit for query {key} (access count: {})",
            entry.access_count
        );
        Some(entry.response.clone())
    }

    /// Insert a response. `ttl` overrides the configured default; a zero
    /// default disables expiry.
    pub fn set(&self, query: &SearchQuery, response: &SearchResponse, ttl: Option<Duration>) {
        if !self.options.enabled {
            return;
        }

        let key = Self::hash_query(query);
        let now = Instant::now();
        let ttl = ttl.unwrap_or(Duration::from_secs(self.options.ttl_seconds));
        let expires_at = (!ttl.is_zero()).then(|| now + ttl);
        let resource_types: HashSet<ResourceType> = query.resource_types.iter().copied().collect();

        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        if inner.entries.len() >= self.options.max_size {
            self.cleanup(&mut inner);
        }

        for resource_type in &resource_types {
            inner
                .resource_index
                .entry(*resource_type)
                .or_default()
                .insert(key.clone());
        }
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                response: response.clone(),
                created_at: now,
                expires_at,
                resource_types,
                last_accessed: now,
                access_count: 0,
            },
        );
        debug!("Added cache entry {key}");
    }

    /// Remove entries touching `resource_type`, or everything when `None`.
    pub fn invalidate(&self, resource_type: Option<ResourceType>) {
        if !self.options.enabled {
            return;
        }

        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        let Some(resource_type) = resource_type else {
            inner.entries.clear();
            inner.resource_index.clear();
            info!("Invalidated all cache entries");
            return;
        };

        let keys: Vec<String> = inner
            .resource_index
            .get(&resource_type)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            remove_entry(&mut inner, key);
        }
        info!(
            "Invalidated {} cache entries for resource type {resource_type}",
            keys.len()
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();

        let expired_entries = inner
            .entries
            .values()
            .filter(|e| e.expires_at.map(|at| now > at).unwrap_or(false))
            .count();

        let resource_counts = inner
            .resource_index
            .iter()
            .map(|(rt, keys)| (rt.to_string(), keys.len()))
            .collect();

        let avg_age_seconds = if inner.entries.is_empty() {
            0.0
        } else {
            let total: f64 = inner
                .entries
                .values()
                .map(|e| now.duration_since(e.created_at).as_secs_f64())
                .sum();
            total / inner.entries.len() as f64
        };

        CacheStats {
            total_entries: inner.entries.len(),
            expired_entries,
            resource_counts,
            avg_age_seconds,
            enabled: self.options.enabled,
            max_size: self.options.max_size,
            ttl_seconds: self.options.ttl_seconds,
        }
    }

    fn cleanup(&self, inner: &mut CacheInner) {
        let now = Instant::now();

        // Phase 1: expired entries.
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.map(|at| now > at).unwrap_or(false))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            remove_entry(inner, key);
        }
        if inner.entries.len() < self.options.max_size {
            debug!("Cleaned up {} expired cache entries", expired.len());
            return;
        }

        // Phase 2: entries that never earned their keep.
        let cold: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.access_count < self.options.min_access_count)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &cold {
            remove_entry(inner, key);
        }
        if inner.entries.len() < self.options.max_size {
            debug!("Cleaned up {} low-access cache entries", cold.len());
            return;
        }

        // Phase 3: least recently accessed, down past capacity by a slack.
        let to_remove = inner.entries.len() + CLEANUP_SLACK - self.options.max_size;
        let mut by_recency: Vec<(String, Instant)> = inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_accessed))
            .collect();
        by_recency.sort_by_key(|(_, accessed)| *accessed);
        for (key, _) in by_recency.into_iter().take(to_remove) {
            remove_entry(inner, &key);
        }
        debug!("Cleaned up {to_remove} additional cache entries");
    }
}

fn remove_entry(inner: &mut CacheInner, key: &str) {
    let Some(entry) = inner.entries.remove(key) else {
        return;
    };
    for resource_type in &entry.resource_types {
        if let Some(keys) = inner.resource_index.get_mut(resource_type) {
            keys.remove(key);
            if keys.is_empty() {
                inner.resource_index.remove(resource_type);
            }
        }
    }
}
