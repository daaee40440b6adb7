//! HTTP plumbing for the entity service.
//!
//! Uses async reqwest internally with a shared tokio runtime, but presents
//! a sync interface so rayon workers can issue requests without owning an
//! executor.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout (connect + response body)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport-level error with the HTTP status class the engine cares about.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// HTTP status code, if the request got far enough to receive one
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "HTTP {s}: {}", self.message),
            None => write!(f, "HTTP error: {}", self.message),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Rate-limit signal from the service
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Authentication / authorization rejection (run-fatal upstream)
    pub fn is_auth(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }

    /// Server errors and transport failures without a status are transient.
    pub fn is_transient(&self) -> bool {
        match self.status {
            Some(s) => (500..600).contains(&s),
            None => true,
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Blocking GET returning the response body as text.
///
/// Non-2xx statuses come back as `HttpError` with the status attached;
/// the caller classifies them.
pub fn get_text(url: &str) -> Result<String, HttpError> {
    SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HttpError::from_reqwest(&e))?;
        response.text().await.map_err(|e| HttpError::from_reqwest(&e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(status: u16) -> HttpError {
        HttpError {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn status_429_is_rate_limited() {
        assert!(err(429).is_rate_limited());
        assert!(!err(429).is_transient());
    }

    #[test]
    fn status_404_is_not_found() {
        assert!(err(404).is_not_found());
        assert!(!err(404).is_transient());
    }

    #[test]
    fn auth_statuses() {
        assert!(err(401).is_auth());
        assert!(err(403).is_auth());
        assert!(!err(404).is_auth());
    }

    #[test]
    fn server_errors_transient() {
        assert!(err(500).is_transient());
        assert!(err(503).is_transient());
    }

    #[test]
    fn missing_status_transient() {
        let e = HttpError {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(e.is_transient());
        assert!(!e.is_rate_limited());
    }

    #[test]
    fn display_with_status() {
        assert_eq!(format!("{}", err(503)), "HTTP 503: test");
    }

    #[test]
    fn display_without_status() {
        let e = HttpError {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{e}"), "HTTP error: timeout");
    }
}
