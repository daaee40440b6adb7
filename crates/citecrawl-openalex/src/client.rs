//! OpenAlex works API endpoint
//!
//! The fetcher talks to the service through the [`WorksEndpoint`] seam:
//! one batched filter query in, one raw body out, with HTTP status
//! classification left to [`citecrawl_core::HttpError`]. Tests substitute
//! a scripted endpoint.

use citecrawl_core::{HttpError, http};

use crate::record::WorkId;

/// Public OpenAlex API base
pub const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// Hard ceiling on identifiers per pipe-joined filter query.
pub const MAX_IDS_PER_PAGE: usize = 50;

/// Transport seam for batched works retrieval.
pub trait WorksEndpoint: Send + Sync {
    /// Issue one page request for the given identifier batch, returning
    /// the raw response body.
    fn fetch_page(&self, ids: &[WorkId]) -> Result<String, HttpError>;
}

/// HTTP endpoint against a live OpenAlex instance.
pub struct HttpEndpoint {
    base_url: String,
    mailto: Option<String>,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, mailto: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto: mailto.map(String::from),
        }
    }

    /// Batched filter query: `/works?filter=openalex:W1|W2&per-page=N`.
    fn page_url(&self, ids: &[WorkId]) -> String {
        let mut url = format!(
            "{}/works?filter=openalex:{}&per-page={}",
            self.base_url,
            ids.join("|"),
            ids.len()
        );
        if let Some(mailto) = &self.mailto {
            url.push_str("&mailto=");
            url.push_str(mailto);
        }
        url
    }
}

impl WorksEndpoint for HttpEndpoint {
    fn fetch_page(&self, ids: &[WorkId]) -> Result<String, HttpError> {
        let url = self.page_url(ids);
        log::debug!("GET {url}");
        http::get_text(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<WorkId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn page_url_joins_ids_with_pipes() {
        let ep = HttpEndpoint::new(DEFAULT_BASE_URL, None);
        assert_eq!(
            ep.page_url(&ids(&["W1", "W2", "W3"])),
            "https://api.openalex.org/works?filter=openalex:W1|W2|W3&per-page=3"
        );
    }

    #[test]
    fn page_url_appends_mailto() {
        let ep = HttpEndpoint::new(DEFAULT_BASE_URL, Some("crawler@example.org"));
        let url = ep.page_url(&ids(&["W1"]));
        assert!(url.ends_with("&mailto=crawler@example.org"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let ep = HttpEndpoint::new("https://api.openalex.org/", None);
        assert!(
            ep.page_url(&ids(&["W1"]))
                .starts_with("https://api.openalex.org/works?")
        );
    }
}
