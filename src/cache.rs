use log::debug;
use lru_time_cache::LruCache;
use sha1::{Digest, Sha1};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Bounded memo of suggestion text keyed by the exact prompt.
///
/// Least recently used entries are evicted once `capacity` is reached, and
/// entries older than the TTL (when set) are treated as absent. Prompts
/// carrying a re-roll nonce never hit.
pub struct PromptCache {
    entries: Mutex<LruCache<String, String>>,
}

impl PromptCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let entries = match ttl {
            Some(ttl) => LruCache::with_expiry_duration_and_capacity(ttl, capacity),
            None => LruCache::with_capacity(capacity),
        };
        Self {
            entries: Mutex::new(entries),
        }
    }

    fn key(prompt: &str) -> String {
        format!("{:x}", Sha1::digest(prompt.as_bytes()))
    }

    pub fn get(&self, prompt: &str) -> Option<String> {
        let key = Self::key(prompt);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let hit = entries.get(&key).cloned();
        debug!("Prompt cache {} for key {}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    pub fn insert(&self, prompt: &str, suggestion: String) {
        let key = Self::key(prompt);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, suggestion);
    }
}
