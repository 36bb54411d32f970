//! Tagged TTL cache for read endpoints.
//!
//! Entries are keyed by tag strings and dropped either when their TTL runs
//! out or when a write invalidates the tag.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use afibdash_core::ElementType;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

pub const STATS_TTL: Duration = Duration::from_secs(60);
pub const COUNT_TTL: Duration = Duration::from_secs(60);
pub const FEED_TTL: Duration = Duration::from_secs(60);
pub const SUMMARY_TTL: Duration = Duration::from_secs(30 * 60);

pub const FEED_TAG: &str = "clinical-picture-feed";
pub const SHARE_COUNT_TAG: &str = "clinical-picture-count";
pub const SUMMARY_TAG: &str = "clinical-picture-summary";

pub fn stats_tag(element_type: ElementType) -> String {
    format!("disease-element-stats:{}", element_type.id())
}

/// `None` is the count across every category.
pub fn count_tag(element_type: Option<ElementType>) -> String {
    match element_type {
        Some(t) => format!("disease-element-count:{}", t.id()),
        None => "disease-element-count:all".to_string(),
    }
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Thread-safe response cache.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `tag`, or `None` on miss or expiry.
    pub fn get(&self, tag: &str) -> Option<Value> {
        self.get_at(tag, Instant::now())
    }

    fn get_at(&self, tag: &str, now: Instant) -> Option<Value> {
        let mut entries = self.entries.lock();
        let expired = entries.get(tag).map(|entry| entry.expires_at <= now);
        match expired {
            Some(false) => entries.get(tag).map(|entry| entry.value.clone()),
            Some(true) => {
                entries.remove(tag);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, tag: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.lock().insert(
            tag.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, tag: &str) {
        if self.entries.lock().remove(tag).is_some() {
            debug!(tag, "Invalidated cached response");
        }
    }

    /// Drop the overall count plus the count and stats of each category.
    /// An empty list means the affected categories are unknown, so all of
    /// them are dropped.
    pub fn invalidate_elements(&self, types: &[ElementType]) {
        let types: &[ElementType] = if types.is_empty() { &ElementType::ALL } else { types };
        self.invalidate(&count_tag(None));
        for t in types {
            self.invalidate(&count_tag(Some(*t)));
            self.invalidate(&stats_tag(*t));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
