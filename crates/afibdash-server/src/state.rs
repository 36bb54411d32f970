//! Shared application state.

use afibdash_core::AppConfig;
use afibdash_protocol::RateLimiter;
use afibdash_store::Store;
use afibdash_summarize::SummaryConfig;
use reqwest::Client;

use crate::cache::ResponseCache;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: AppConfig,
    pub summary_config: SummaryConfig,
    pub store: Store,
    pub rate_limiter: RateLimiter,
    pub cache: ResponseCache,
    /// Outbound client for captcha and model calls.
    pub http: Client,
}

impl AppState {
    pub fn new(config: AppConfig, summary_config: SummaryConfig, store: Store) -> Self {
        Self {
            config,
            summary_config,
            store,
            rate_limiter: RateLimiter::new(),
            cache: ResponseCache::new(),
            http: Client::new(),
        }
    }
}
