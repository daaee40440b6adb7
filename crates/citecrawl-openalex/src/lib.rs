//! Citecrawl OpenAlex - citation cascade extraction engine
//!
//! Expands the citation graph reachable from a set of seed works, one BFS
//! level at a time, against the OpenAlex works API. Each level completes
//! fully (all new nodes discovered, all duplicates resolved) before the
//! next begins; page fetches within a level run in parallel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use citecrawl_core::{CancelToken, ProgressContext};
//! use citecrawl_openalex::{Crawler, CrawlConfig, HttpEndpoint};
//!
//! let config = CrawlConfig {
//!     max_levels: 2,
//!     max_nodes: 500,
//!     ..Default::default()
//! };
//! let endpoint = Arc::new(HttpEndpoint::new(&config.base_url, None));
//! let crawler = Crawler::new(config, endpoint, Arc::new(ProgressContext::new()));
//! let outcome = crawler
//!     .run(&["W2741809807".to_string()], &CancelToken::new())
//!     .expect("bad roots");
//! println!("{} nodes", outcome.graph.node_count());
//! ```

pub mod abstract_decode;
pub mod client;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod graph;
pub mod profiler;
pub mod record;
pub mod visited;

// Re-exports for convenience
pub use client::{HttpEndpoint, WorksEndpoint};
pub use config::CrawlConfig;
pub use crawler::{CrawlError, CrawlOutcome, Crawler, LevelStats, Termination};
pub use error::{FailureKind, FetchError};
pub use fetcher::EntityFetcher;
pub use graph::{CitationGraph, GraphSnapshot, Node};
pub use profiler::{FetchProfiler, FetchSummary};
pub use record::{EntityRecord, WorkId, WorkMeta, WorkRecord};
pub use visited::VisitedRegistry;
