pub mod cache;
pub mod error;
pub mod fetcher;
pub mod response;

use std::time::Duration;

/// Re-export common types for easier usage
pub use cache::{CacheConfig, CacheStats, TtlCache, DEFAULT_TTL};
pub use error::NetworkError;
pub use fetcher::{Fetcher, HttpFetcher, MemoryFetcher};
pub use response::Response;

/// Central networking configuration
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Base URL that relative resource paths are resolved against
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            request_timeout: Duration::from_secs(30),
            max_redirects: 10,
            user_agent: format!("Folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
