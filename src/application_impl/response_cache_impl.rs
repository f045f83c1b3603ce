use crate::domain_model::CacheKey;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_entries: 512,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub validator: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub stored_at: Instant,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    path: String,
    response: CachedResponse,
    expires_at: Instant,
}

/// Read responses that carried a validator, keyed by request identity.
pub struct ResponseCache {
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live entry for `key`; an expired one is evicted on the way.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a response. Responses without a validator are not cacheable.
    pub fn store(
        &self,
        key: CacheKey,
        path: &str,
        validator: Option<&str>,
        status: u16,
        headers: Vec<(String, String)>,
        body: Value,
        ttl: Option<Duration>,
    ) {
        let Some(validator) = validator.filter(|v| !v.is_empty()) else {
            return;
        };
        let now = Instant::now();
        let entry = CacheEntry {
            path: path.to_owned(),
            response: CachedResponse {
                validator: validator.to_owned(),
                status,
                headers,
                body,
                stored_at: now,
            },
            expires_at: now + ttl.unwrap_or(self.config.default_ttl),
        };
        let mut entries = self.lock();
        entries.insert(key, entry);
        self.prune_locked(&mut entries, now);
    }

    /// The server confirmed the entry with 304: restart its lifetime and
    /// hand back the stored body.
    pub fn revalidated(&self, key: &CacheKey, ttl: Option<Duration>) -> Option<CachedResponse> {
        let mut entries = self.lock();
        let entry = entries.get_mut(key)?;
        let now = Instant::now();
        entry.response.stored_at = now;
        entry.expires_at = now + ttl.unwrap_or(self.config.default_ttl);
        Some(entry.response.clone())
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drops every entry stored for `path`, whatever its query.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.path != path);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_locked(&self, entries: &mut HashMap<CacheKey, CacheEntry>, now: Instant) {
        entries.retain(|_, entry| now < entry.expires_at);
        if entries.len() <= self.config.max_entries {
            return;
        }

        let mut keys_by_age = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.response.stored_at))
            .collect::<Vec<_>>();
        keys_by_age.sort_by_key(|(_, stored_at)| *stored_at);

        let evict_count = entries.len().saturating_sub(self.config.max_entries);
        for (key, _) in keys_by_age.into_iter().take(evict_count) {
            entries.remove(&key);
        }
        tracing::debug!("response cache evicted {} entries", evict_count);
    }
}
