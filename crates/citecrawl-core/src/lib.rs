//! Citecrawl Core - Common infrastructure for citation crawling
//!
//! This crate provides the ambient pieces shared by the cascade engine
//! and the CLI: a shared HTTP client/runtime, transport error
//! classification, retry and rate-limit policies, cooperative
//! cancellation, logging, and progress reporting.

pub mod cancel;
pub mod http;
pub mod logging;
pub mod progress;
pub mod ratelimit;
pub mod retry;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use http::{HttpError, SHARED_RUNTIME, http_client};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use ratelimit::RateLimiter;
pub use retry::RetryPolicy;
