//! Batched, paginated entity retrieval
//!
//! Partitions an identifier batch into pages, issues one request per page
//! through the endpoint seam, and resolves every requested identifier to
//! a success or a classified failure. Pages run in parallel on rayon
//! workers; the shared rate limiter paces all of them; each terminal
//! outcome is reported to the profiler exactly once.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use citecrawl_core::{CancelToken, RateLimiter, RetryPolicy};

use crate::client::{MAX_IDS_PER_PAGE, WorksEndpoint};
use crate::error::FetchError;
use crate::profiler::FetchProfiler;
use crate::record::{EntityRecord, WorkId, WorkRecord};

/// Result sequence for one batch: exactly one entry per requested id.
pub type FetchResults = Vec<(WorkId, Result<EntityRecord, FetchError>)>;

/// Works-API list response envelope.
///
/// A 200 body without `meta` (or with an `error` field) is the service's
/// way of reporting a bad query; it poisons the whole page.
#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    meta: Option<PageMeta>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<WorkRecord>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    #[allow(dead_code)]
    count: i64,
}

/// Paginated fetcher over a works endpoint.
pub struct EntityFetcher {
    endpoint: Arc<dyn WorksEndpoint>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    profiler: Arc<FetchProfiler>,
    page_size: usize,
    workers: usize,
}

impl EntityFetcher {
    pub fn new(
        endpoint: Arc<dyn WorksEndpoint>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        profiler: Arc<FetchProfiler>,
        page_size: usize,
        workers: usize,
    ) -> Self {
        Self {
            endpoint,
            limiter,
            retry,
            profiler,
            page_size: page_size.clamp(1, MAX_IDS_PER_PAGE),
            workers: workers.max(1),
        }
    }

    pub fn profiler(&self) -> &Arc<FetchProfiler> {
        &self.profiler
    }

    /// Fetch a batch of identifiers, one terminal outcome each.
    ///
    /// Results come back in request order (pages in order, request order
    /// within a page). On cancellation, pages not yet completed are
    /// abandoned and simply absent from the output.
    pub fn fetch_entities(
        &self,
        ids: &[WorkId],
        cancel: &CancelToken,
        pb: &ProgressBar,
    ) -> FetchResults {
        if ids.is_empty() {
            return Vec::new();
        }
        let pages: Vec<&[WorkId]> = ids.chunks(self.page_size).collect();
        let outcomes: Mutex<Vec<Option<FetchResults>>> = Mutex::new(vec![None; pages.len()]);
        let next_page = AtomicUsize::new(0);
        let workers = self.workers.min(pages.len());

        rayon::scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| {
                    loop {
                        let page_idx = next_page.fetch_add(1, Ordering::SeqCst);
                        if page_idx >= pages.len() || cancel.is_cancelled() {
                            break;
                        }
                        let page = pages[page_idx];
                        match self.fetch_page(page, cancel, pb) {
                            Some(results) => {
                                pb.inc(page.len() as u64);
                                outcomes.lock().expect("fetch worker panicked")[page_idx] =
                                    Some(results);
                            }
                            // cancelled mid-page; leave the slot empty
                            None => break,
                        }
                    }
                });
            }
        });

        let mut flat = Vec::with_capacity(ids.len());
        for page in outcomes.into_inner().expect("fetch worker panicked") {
            if let Some(results) = page {
                flat.extend(results);
            }
        }
        flat
    }

    /// One page, retried through the backoff policy. Terminal outcomes
    /// are recorded with the profiler here. Returns None when abandoned
    /// by cancellation.
    fn fetch_page(
        &self,
        ids: &[WorkId],
        cancel: &CancelToken,
        pb: &ProgressBar,
    ) -> Option<FetchResults> {
        let mut attempt = 0u32;
        let results = loop {
            if !self.limiter.acquire(cancel) {
                return None;
            }
            let started = Instant::now();
            let response = self.endpoint.fetch_page(ids);
            self.profiler.track_request(started.elapsed());

            match response.map_err(FetchError::from).and_then(|body| parse_page(ids, &body)) {
                Ok(results) => break results,
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    pb.set_message(format!("retry {attempt}/{}", self.retry.max_retries));
                    log::debug!(
                        "page of {} ids: attempt {attempt}/{} failed: {e}, backing off",
                        ids.len(),
                        self.retry.max_retries
                    );
                    if !self.retry.backoff(attempt, cancel) {
                        return None;
                    }
                }
                // Permanent (or retry-exhausted) page failure degrades to a
                // terminal failure for every identifier on the page.
                Err(e) => {
                    log::warn!("page of {} ids failed permanently: {e}", ids.len());
                    break ids.iter().map(|id| (id.clone(), Err(e.clone()))).collect();
                }
            }
        };
        pb.set_message("");

        for (id, result) in &results {
            match result {
                Ok(_) => self.profiler.record_success(id),
                Err(e) => self.profiler.record_failure(id, e),
            }
        }
        Some(results)
    }
}

/// Decode a page body and align records to the requested identifiers.
///
/// The service may return filter results in any order; requested ids
/// missing from a well-formed response resolve to `NotFound`.
fn parse_page(ids: &[WorkId], body: &str) -> Result<FetchResults, FetchError> {
    let page: PageResponse = sonic_rs::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("undecodable page body: {e}")))?;

    if let Some(error) = page.error {
        let detail = match page.message {
            Some(msg) => format!("{error} -- {msg}"),
            None => error,
        };
        return Err(FetchError::Malformed(format!("service error: {detail}")));
    }
    if page.meta.is_none() {
        return Err(FetchError::Malformed("response missing meta".to_string()));
    }

    let mut by_id: FxHashMap<WorkId, EntityRecord> = FxHashMap::default();
    for raw in page.results {
        match EntityRecord::try_from(raw) {
            Ok(rec) => {
                by_id.insert(rec.id.clone(), rec);
            }
            Err(e) => log::debug!("skipping record: {e}"),
        }
    }

    Ok(ids
        .iter()
        .map(|id| match by_id.remove(id) {
            Some(rec) => (id.clone(), Ok(rec)),
            None => (id.clone(), Err(FetchError::NotFound)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(results: Vec<serde_json::Value>) -> String {
        json!({"meta": {"count": results.len()}, "results": results}).to_string()
    }

    fn work(id: &str) -> serde_json::Value {
        json!({"id": format!("https://openalex.org/{id}"), "title": id})
    }

    fn ids(list: &[&str]) -> Vec<WorkId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_page_aligns_to_request_order() {
        let body = body(vec![work("W2"), work("W1")]);
        let results = parse_page(&ids(&["W1", "W2"]), &body).unwrap();
        assert_eq!(results[0].0, "W1");
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "W2");
    }

    #[test]
    fn parse_page_missing_id_is_not_found() {
        let body = body(vec![work("W1")]);
        let results = parse_page(&ids(&["W1", "W404"]), &body).unwrap();
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].1, Err(FetchError::NotFound));
    }

    #[test]
    fn parse_page_undecodable_body() {
        let err = parse_page(&ids(&["W1"]), "<html>gateway</html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn parse_page_service_error_envelope() {
        let body = json!({"error": "Invalid filter", "message": "bad key"}).to_string();
        let err = parse_page(&ids(&["W1"]), &body).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(ref d) if d.contains("Invalid filter")));
    }

    #[test]
    fn parse_page_missing_meta_is_malformed() {
        let body = json!({"results": []}).to_string();
        let err = parse_page(&ids(&["W1"]), &body).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn parse_page_skips_record_without_id() {
        let body = body(vec![json!({"title": "orphan"}), work("W1")]);
        let results = parse_page(&ids(&["W1"]), &body).unwrap();
        assert!(results[0].1.is_ok());
    }
}
