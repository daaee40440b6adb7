//! Level-synchronized BFS over the citation relation
//!
//! The crawler owns the run: it admits roots, dispatches each frontier to
//! the fetcher, expands results into the graph, and computes the next
//! frontier. Page fetches within a level run in parallel; levels are
//! strictly sequential — level n+1 never starts before level n has fully
//! expanded, because the next frontier is only well-defined then.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;

use citecrawl_core::{CancelToken, ProgressContext, RateLimiter, SharedProgress, fmt_num};

use crate::client::WorksEndpoint;
use crate::config::CrawlConfig;
use crate::error::FetchError;
use crate::fetcher::EntityFetcher;
use crate::graph::{CitationGraph, GraphSnapshot};
use crate::profiler::{FetchProfiler, FetchSummary};
use crate::record::{WorkId, WorkMeta, normalize_work_id};
use crate::visited::VisitedRegistry;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Frontier ran dry: the reachable cascade is fully explored
    Exhausted,
    /// Level cap hit; the last frontier remains as unexpanded leaves
    LevelCap,
    /// Node budget hit; admission was truncated in first-seen order
    NodeCap,
    /// Cooperative cancellation; partial results kept
    Cancelled { level: u32 },
    /// Run-fatal fetch failure; partial results kept
    Aborted { level: u32, error: FetchError },
}

impl Termination {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "complete (frontier exhausted)"),
            Self::LevelCap => write!(f, "complete (level cap reached)"),
            Self::NodeCap => write!(f, "complete (node budget reached)"),
            Self::Cancelled { level } => write!(f, "cancelled at level {level}"),
            Self::Aborted { level, error } => write!(f, "aborted at level {level}: {error}"),
        }
    }
}

/// Caller-side errors raised before any fetching starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    EmptyRoots,
    MalformedRoot(String),
    DuplicateRoot(WorkId),
}

impl std::fmt::Display for CrawlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRoots => write!(f, "no root identifiers given"),
            Self::MalformedRoot(raw) => write!(f, "malformed root identifier: {raw:?}"),
            Self::DuplicateRoot(id) => write!(f, "duplicate root identifier: {id}"),
        }
    }
}

impl std::error::Error for CrawlError {}

/// Per-level accounting.
#[derive(Debug, Clone)]
pub struct LevelStats {
    pub level: u32,
    /// Identifiers dispatched at this level
    pub frontier: usize,
    pub fetched: usize,
    pub failed: usize,
    /// Newly admitted identifiers forming the next frontier
    pub admitted: usize,
    pub elapsed: Duration,
}

impl LevelStats {
    fn log(&self) {
        log::info!(
            "level {}: {}/{} fetched ({} failed), {} admitted for next level [{:.1}s]",
            self.level,
            fmt_num(self.fetched),
            fmt_num(self.frontier),
            fmt_num(self.failed),
            fmt_num(self.admitted),
            self.elapsed.as_secs_f64()
        );
    }
}

/// Everything a run produced, fatal or not.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub graph: GraphSnapshot,
    pub profile: FetchSummary,
    pub termination: Termination,
    pub levels: Vec<LevelStats>,
    pub elapsed: Duration,
}

/// Level-synchronized cascade crawler. Drives a single run; the graph,
/// registry, and profiler accumulate for the crawler's lifetime.
pub struct Crawler {
    config: CrawlConfig,
    fetcher: EntityFetcher,
    visited: VisitedRegistry,
    graph: Arc<CitationGraph>,
    profiler: Arc<FetchProfiler>,
    progress: SharedProgress,
}

impl Crawler {
    pub fn new(
        config: CrawlConfig,
        endpoint: Arc<dyn WorksEndpoint>,
        progress: SharedProgress,
    ) -> Self {
        let profiler = Arc::new(FetchProfiler::new());
        let limiter = Arc::new(RateLimiter::new(config.rate_per_sec, config.burst));
        let fetcher = EntityFetcher::new(
            endpoint,
            limiter,
            config.retry.clone(),
            profiler.clone(),
            config.page_size,
            config.workers,
        );
        Self {
            config,
            fetcher,
            visited: VisitedRegistry::new(),
            graph: Arc::new(CitationGraph::new()),
            profiler,
            progress,
        }
    }

    /// Crawler with a default (hidden) progress context, for library use.
    pub fn headless(config: CrawlConfig, endpoint: Arc<dyn WorksEndpoint>) -> Self {
        Self::new(config, endpoint, Arc::new(ProgressContext::new()))
    }

    /// Shared graph handle for mid-run introspection.
    pub fn graph(&self) -> &Arc<CitationGraph> {
        &self.graph
    }

    /// Shared profiler handle for mid-run introspection.
    pub fn profiler(&self) -> &Arc<FetchProfiler> {
        &self.profiler
    }

    /// Run the cascade from the given roots until a stopping condition.
    ///
    /// Fatal fetch failures and cancellation do not discard progress: the
    /// outcome always carries the graph and profile accumulated so far.
    pub fn run(&self, roots: &[String], cancel: &CancelToken) -> Result<CrawlOutcome, CrawlError> {
        let start = Instant::now();
        let mut truncated = false;
        let mut frontier = self.admit_roots(roots, &mut truncated)?;
        let mut pending_edges: Vec<(WorkId, WorkId)> = Vec::new();
        let mut levels: Vec<LevelStats> = Vec::new();
        let mut level: u32 = 0;

        // A zero-level run admits the roots as leaves and fetches nothing.
        if self.config.max_levels == 0 {
            self.add_leaves(&frontier, 0);
            return Ok(self.finish(Termination::LevelCap, levels, start));
        }

        let termination = loop {
            if cancel.is_cancelled() {
                break Termination::Cancelled { level };
            }

            // LevelFetching
            let level_start = Instant::now();
            let pb = self.progress.level_bar(level, frontier.len() as u64);
            let outcomes = self.fetcher.fetch_entities(&frontier, cancel, &pb);
            pb.finish_and_clear();
            if cancel.is_cancelled() {
                self.settle_edges(&mut pending_edges, &[]);
                break Termination::Cancelled { level };
            }

            // LevelExpanding — sequential and in frontier order, so the
            // next frontier (and any truncation) is deterministic.
            let mut reserved = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
            let mut next: Vec<WorkId> = Vec::new();
            let mut fetched = 0usize;
            let mut failed = 0usize;
            let mut fatal: Option<FetchError> = None;

            for (id, result) in outcomes {
                match result {
                    Ok(rec) => {
                        reserved -= 1;
                        self.graph.add_node(&rec.id, rec.meta, level);
                        fetched += 1;
                        for cited in rec.cited {
                            if !self.visited.contains(&cited) {
                                if self.level_quota(reserved, next.len()) == 0 {
                                    truncated = true;
                                } else if self.visited.admit(&cited) {
                                    next.push(cited.clone());
                                }
                            }
                            pending_edges.push((id.clone(), cited));
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        if e.is_fatal() && fatal.is_none() {
                            fatal = Some(e);
                        }
                    }
                }
            }

            self.settle_edges(&mut pending_edges, &next);

            let stats = LevelStats {
                level,
                frontier: frontier.len(),
                fetched,
                failed,
                admitted: next.len(),
                elapsed: level_start.elapsed(),
            };
            if !self.progress.is_tty() {
                stats.log();
            }
            levels.push(stats);

            if let Some(error) = fatal {
                break Termination::Aborted { level, error };
            }

            // Termination checks, in priority order
            if next.is_empty() {
                break if truncated {
                    Termination::NodeCap
                } else {
                    Termination::Exhausted
                };
            }
            if level + 1 >= self.config.max_levels {
                self.add_leaves(&next, level + 1);
                self.settle_edges(&mut pending_edges, &[]);
                break Termination::LevelCap;
            }
            if truncated {
                self.add_leaves(&next, level + 1);
                self.settle_edges(&mut pending_edges, &[]);
                break Termination::NodeCap;
            }

            frontier = next;
            level += 1;
        };

        Ok(self.finish(termination, levels, start))
    }

    /// Normalize, validate, and admit the caller-supplied roots.
    fn admit_roots(
        &self,
        roots: &[String],
        truncated: &mut bool,
    ) -> Result<Vec<WorkId>, CrawlError> {
        if roots.is_empty() {
            return Err(CrawlError::EmptyRoots);
        }
        let mut frontier = Vec::with_capacity(roots.len());
        for raw in roots {
            let id = normalize_work_id(raw)
                .ok_or_else(|| CrawlError::MalformedRoot(raw.clone()))?;
            if frontier.len() >= self.config.max_nodes {
                *truncated = true;
                break;
            }
            if !self.visited.admit(&id) {
                return Err(CrawlError::DuplicateRoot(id));
            }
            frontier.push(id);
        }
        Ok(frontier)
    }

    /// Remaining node-budget slots at an admission point.
    ///
    /// `reserved` counts successfully fetched frontier members not yet
    /// expanded (their nodes are still to come); `admitted` counts ids
    /// already pushed to the next frontier. Failed identifiers consume a
    /// slot only under the stricter configurable policy.
    fn level_quota(&self, reserved: usize, admitted: usize) -> usize {
        if self.config.count_failed_toward_cap {
            self.config.max_nodes.saturating_sub(self.visited.len())
        } else {
            self.config
                .max_nodes
                .saturating_sub(self.graph.node_count() + reserved + admitted)
        }
    }

    /// Admitted-but-never-fetched frontier members become metadata-less
    /// leaf nodes at the boundary level.
    fn add_leaves(&self, ids: &[WorkId], level: u32) {
        for id in ids {
            self.graph.add_node(id, WorkMeta::default(), level);
        }
    }

    /// Resolve pending edges whose endpoints are settled. Edges pointing
    /// into `deferred` (the not-yet-fetched next frontier) are kept for
    /// the next pass; the rest are added now or dropped if their target
    /// never became a node (failed fetch, truncated admission).
    fn settle_edges(&self, pending: &mut Vec<(WorkId, WorkId)>, deferred: &[WorkId]) {
        let deferred: FxHashSet<&str> = deferred.iter().map(String::as_str).collect();
        pending.retain(|(citer, cited)| {
            if deferred.contains(cited.as_str()) {
                return true;
            }
            if !self.graph.add_edge(citer, cited) {
                log::debug!("dropping edge {citer} -> {cited}: target absent");
            }
            false
        });
    }

    fn finish(
        &self,
        termination: Termination,
        levels: Vec<LevelStats>,
        start: Instant,
    ) -> CrawlOutcome {
        let outcome = CrawlOutcome {
            graph: self.graph.snapshot(),
            profile: self.profiler.snapshot(),
            termination,
            levels,
            elapsed: start.elapsed(),
        };
        log::info!(
            "cascade {}: {} nodes, {} edges in {:.1}s",
            outcome.termination,
            fmt_num(outcome.graph.node_count()),
            fmt_num(outcome.graph.edge_count()),
            outcome.elapsed.as_secs_f64()
        );
        outcome
    }
}
