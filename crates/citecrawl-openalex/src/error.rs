//! Fetch error taxonomy for the cascade engine

use citecrawl_core::HttpError;

/// Classified outcome of a failed entity fetch.
///
/// `RateLimited` and `Network` are retried with backoff; `NotFound` and
/// `Malformed` are permanent for the affected identifier and never abort
/// the level; `Auth` is fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    RateLimited,
    Network(String),
    NotFound,
    Malformed(String),
    Auth(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Network(msg) => write!(f, "network failure: {msg}"),
            Self::NotFound => write!(f, "not found"),
            Self::Malformed(msg) => write!(f, "malformed record: {msg}"),
            Self::Auth(msg) => write!(f, "authentication failure: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Network(_))
    }

    /// Fatal errors abort the whole run, not just the identifier.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::RateLimited,
            Self::Network(_) => FailureKind::Network,
            Self::NotFound => FailureKind::NotFound,
            Self::Malformed(_) => FailureKind::Malformed,
            Self::Auth(_) => FailureKind::Auth,
        }
    }
}

impl From<HttpError> for FetchError {
    fn from(e: HttpError) -> Self {
        if e.is_rate_limited() {
            Self::RateLimited
        } else if e.is_not_found() {
            Self::NotFound
        } else if e.is_auth() {
            Self::Auth(e.to_string())
        } else {
            // 5xx and transport failures without a status
            Self::Network(e.to_string())
        }
    }
}

/// Failure category used for profiler aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RateLimited,
    Network,
    NotFound,
    Malformed,
    Auth,
}

impl FailureKind {
    pub fn all() -> &'static [FailureKind] {
        &[
            Self::RateLimited,
            Self::Network,
            Self::NotFound,
            Self::Malformed,
            Self::Auth,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Network => "network",
            Self::NotFound => "not_found",
            Self::Malformed => "malformed",
            Self::Auth => "auth",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> HttpError {
        HttpError {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn classify_429() {
        let e = FetchError::from(http(429));
        assert_eq!(e, FetchError::RateLimited);
        assert!(e.is_retryable());
        assert!(!e.is_fatal());
    }

    #[test]
    fn classify_404() {
        let e = FetchError::from(http(404));
        assert_eq!(e, FetchError::NotFound);
        assert!(!e.is_retryable());
        assert!(!e.is_fatal());
    }

    #[test]
    fn classify_auth() {
        for status in [401, 403] {
            let e = FetchError::from(http(status));
            assert!(e.is_fatal());
            assert!(!e.is_retryable());
        }
    }

    #[test]
    fn classify_server_error() {
        let e = FetchError::from(http(503));
        assert_eq!(e.kind(), FailureKind::Network);
        assert!(e.is_retryable());
    }

    #[test]
    fn classify_transport_failure() {
        let e = FetchError::from(HttpError {
            status: None,
            message: "connection reset".to_string(),
        });
        assert_eq!(e.kind(), FailureKind::Network);
        assert!(e.is_retryable());
    }

    #[test]
    fn malformed_is_permanent() {
        let e = FetchError::Malformed("no id".to_string());
        assert!(!e.is_retryable());
        assert!(!e.is_fatal());
        assert_eq!(e.kind(), FailureKind::Malformed);
    }

    #[test]
    fn kind_labels() {
        assert_eq!(FailureKind::RateLimited.as_str(), "rate_limited");
        assert_eq!(FailureKind::all().len(), 5);
    }
}
