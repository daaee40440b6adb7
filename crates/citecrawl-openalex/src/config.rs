//! Crawl configuration

use citecrawl_core::RetryPolicy;

use crate::client::DEFAULT_BASE_URL;

/// Runtime configuration for a cascade run
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// BFS levels to expand; the frontier at this level stays unexpanded
    pub max_levels: u32,
    /// Ceiling on total graph nodes, leaves included
    pub max_nodes: usize,
    /// Identifiers per batched filter query (service-capped at 50)
    pub page_size: usize,
    /// Parallel page fetches within a level
    pub workers: usize,
    /// Sustained requests per second across all workers
    pub rate_per_sec: f64,
    /// Token-bucket burst headroom
    pub burst: usize,
    pub retry: RetryPolicy,
    /// Works API base URL
    pub base_url: String,
    /// Courtesy contact address appended to every request
    pub mailto: Option<String>,
    /// Stricter budget policy: failed identifiers also consume node slots
    pub count_failed_toward_cap: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            max_levels: 10,
            max_nodes: 10_000,
            page_size: 50,
            workers: cpus.min(8),
            rate_per_sec: 10.0,
            burst: 10,
            retry: RetryPolicy::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto: None,
            count_failed_toward_cap: false,
        }
    }
}
