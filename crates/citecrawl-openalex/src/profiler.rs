//! Fetch outcome accounting
//!
//! Every terminal fetch outcome is recorded exactly once; the summary
//! distinguishes "complete, clean" from "complete with unresolved
//! identifiers" from an aborted run. The write path is append-only and
//! safe for concurrent reporting from in-flight page fetches; snapshots
//! may be taken at any time mid-run.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use citecrawl_core::fmt_num;

use crate::error::{FailureKind, FetchError};
use crate::record::WorkId;

/// Bound on retained failure samples (counts are always exact).
const MAX_SAMPLES: usize = 20;

/// One retained failure, for diagnostics.
#[derive(Debug, Clone)]
pub struct FailureSample {
    pub id: WorkId,
    pub kind: FailureKind,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Terminal failure counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounts {
    pub rate_limited: usize,
    pub network: usize,
    pub not_found: usize,
    pub malformed: usize,
    pub auth: usize,
}

impl FailureCounts {
    fn slot(&mut self, kind: FailureKind) -> &mut usize {
        match kind {
            FailureKind::RateLimited => &mut self.rate_limited,
            FailureKind::Network => &mut self.network,
            FailureKind::NotFound => &mut self.not_found,
            FailureKind::Malformed => &mut self.malformed,
            FailureKind::Auth => &mut self.auth,
        }
    }

    pub fn get(&self, kind: FailureKind) -> usize {
        match kind {
            FailureKind::RateLimited => self.rate_limited,
            FailureKind::Network => self.network,
            FailureKind::NotFound => self.not_found,
            FailureKind::Malformed => self.malformed,
            FailureKind::Auth => self.auth,
        }
    }

    pub fn total(&self) -> usize {
        FailureKind::all().iter().map(|k| self.get(*k)).sum()
    }
}

#[derive(Debug, Default)]
struct ProfilerState {
    attempted: usize,
    succeeded: usize,
    failures: FailureCounts,
    samples: Vec<FailureSample>,
    requests: usize,
    request_time: Duration,
}

/// Append-only fetch profiler shared across workers.
#[derive(Debug, Default)]
pub struct FetchProfiler {
    state: Mutex<ProfilerState>,
}

impl FetchProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, _id: &str) {
        let mut state = self.state.lock().expect("profiler poisoned");
        state.attempted += 1;
        state.succeeded += 1;
    }

    pub fn record_failure(&self, id: &str, err: &FetchError) {
        let mut state = self.state.lock().expect("profiler poisoned");
        state.attempted += 1;
        *state.failures.slot(err.kind()) += 1;
        if state.samples.len() < MAX_SAMPLES {
            state.samples.push(FailureSample {
                id: id.to_string(),
                kind: err.kind(),
                detail: err.to_string(),
                at: Utc::now(),
            });
        }
    }

    /// Account one issued HTTP request (including retried attempts).
    pub fn track_request(&self, elapsed: Duration) {
        let mut state = self.state.lock().expect("profiler poisoned");
        state.requests += 1;
        state.request_time += elapsed;
    }

    /// Point-in-time copy of the accumulated counts.
    pub fn snapshot(&self) -> FetchSummary {
        let state = self.state.lock().expect("profiler poisoned");
        FetchSummary {
            attempted: state.attempted,
            succeeded: state.succeeded,
            failures: state.failures,
            samples: state.samples.clone(),
            requests: state.requests,
            request_time: state.request_time,
        }
    }
}

/// Aggregate fetch statistics for a run (or a point mid-run).
///
/// Invariant: `attempted == succeeded + failures.total()`.
#[derive(Debug, Clone)]
pub struct FetchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: FailureCounts,
    pub samples: Vec<FailureSample>,
    /// HTTP requests issued, counting retries
    pub requests: usize,
    pub request_time: Duration,
}

impl FetchSummary {
    pub fn failed(&self) -> usize {
        self.failures.total()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Fetch profile")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Count").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Attempted"),
            Cell::new(fmt_num(self.attempted)),
        ]);
        table.add_row(vec![
            Cell::new("Succeeded").fg(Color::Green),
            Cell::new(fmt_num(self.succeeded)).fg(Color::Green),
        ]);
        for kind in FailureKind::all() {
            let count = self.failures.get(*kind);
            if count > 0 {
                table.add_row(vec![
                    Cell::new(kind.as_str()).fg(Color::Red),
                    Cell::new(fmt_num(count)).fg(Color::Red),
                ]);
            }
        }
        table.add_row(vec![
            Cell::new("Requests"),
            Cell::new(format!(
                "{} in {:.1}s",
                fmt_num(self.requests),
                self.request_time.as_secs_f64()
            )),
        ]);

        format!("\n{table}")
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Fetched {}/{} identifiers ({} unresolved), {} requests",
            fmt_num(self.succeeded),
            fmt_num(self.attempted),
            fmt_num(self.failed()),
            fmt_num(self.requests)
        );
    }
}
