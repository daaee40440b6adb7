//! Cascade subcommand - crawl the citation graph from seed works

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use citecrawl_core::{CancelToken, RetryPolicy, SharedProgress, fmt_num};
use citecrawl_openalex::{CrawlConfig, CrawlOutcome, Crawler, HttpEndpoint, Termination};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct CascadeArgs {
    /// Seed work identifiers (short IDs or OpenAlex URLs)
    #[arg(required_unless_present = "roots_file")]
    pub roots: Vec<String>,

    /// File with one seed identifier per line
    #[arg(long, conflicts_with = "roots")]
    pub roots_file: Option<PathBuf>,

    /// Maximum BFS levels to expand
    #[arg(short = 'L', long)]
    pub max_levels: Option<u32>,

    /// Maximum total graph nodes
    #[arg(short = 'N', long)]
    pub max_nodes: Option<usize>,

    /// Identifiers per batched query (max 50)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Number of parallel page fetches
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Courtesy contact address sent with every request
    #[arg(long)]
    pub mailto: Option<String>,

    /// Abort the run after this many seconds, keeping partial results
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Count failed identifiers against the node budget
    #[arg(long)]
    pub strict_budget: bool,

    /// Nodes to show in the preview table
    #[arg(long, default_value_t = 10)]
    pub preview: usize,
}

pub fn run(
    args: CascadeArgs,
    config: &Config,
    progress: &SharedProgress,
    cancel: &CancelToken,
) -> Result<()> {
    let roots = load_roots(&args)?;

    let mailto = args.mailto.or_else(|| config.openalex.mailto.clone());
    let crawl_config = CrawlConfig {
        max_levels: args.max_levels.unwrap_or(config.crawl.max_levels),
        max_nodes: args.max_nodes.unwrap_or(config.crawl.max_nodes),
        page_size: args.page_size.unwrap_or(config.crawl.page_size),
        workers: args.workers.unwrap_or(config.crawl.workers),
        rate_per_sec: config.http.rate_per_sec,
        burst: config.http.burst,
        retry: RetryPolicy {
            max_retries: config.http.max_retries,
            base_delay: Duration::from_secs(config.http.base_delay_secs),
            max_delay: Duration::from_secs(config.http.max_delay_secs),
        },
        base_url: config.openalex.base_url.clone(),
        mailto: mailto.clone(),
        count_failed_toward_cap: args.strict_budget,
    };

    // deadline token shares the signal handler's flag
    let cancel = match args.timeout {
        Some(secs) => cancel.deadline_in(Duration::from_secs(secs)),
        None => cancel.clone(),
    };

    log::info!("Crawling cascade from {} roots", roots.len());
    log::info!("  Levels: {}", crawl_config.max_levels);
    log::info!("  Node budget: {}", fmt_num(crawl_config.max_nodes));
    if mailto.is_none() {
        log::warn!("No mailto configured; set one to join the polite pool");
    }

    let endpoint = Arc::new(HttpEndpoint::new(
        &crawl_config.base_url,
        crawl_config.mailto.as_deref(),
    ));
    let crawler = Crawler::new(crawl_config, endpoint, progress.clone());
    let outcome = crawler.run(&roots, &cancel)?;

    report(&outcome, args.preview, progress);

    if outcome.termination.is_aborted() {
        anyhow::bail!("crawl {}", outcome.termination);
    }
    Ok(())
}

fn load_roots(args: &CascadeArgs) -> Result<Vec<String>> {
    match &args.roots_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read roots file {}", path.display()))?;
            let roots: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from)
                .collect();
            anyhow::ensure!(!roots.is_empty(), "No roots in {}", path.display());
            Ok(roots)
        }
        None => Ok(args.roots.clone()),
    }
}

fn report(outcome: &CrawlOutcome, preview: usize, progress: &SharedProgress) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Cascade").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    table.add_row(vec![
        Cell::new("Status"),
        status_cell(&outcome.termination),
    ]);
    table.add_row(vec![
        Cell::new("Nodes"),
        Cell::new(fmt_num(outcome.graph.node_count())),
    ]);
    table.add_row(vec![
        Cell::new("Edges"),
        Cell::new(fmt_num(outcome.graph.edge_count())),
    ]);
    table.add_row(vec![
        Cell::new("Levels"),
        Cell::new(
            outcome
                .levels
                .iter()
                .map(|l| fmt_num(l.frontier))
                .collect::<Vec<_>>()
                .join(" / "),
        ),
    ]);
    table.add_row(vec![
        Cell::new("Unresolved"),
        Cell::new(fmt_num(outcome.profile.failed())),
    ]);
    table.add_row(vec![
        Cell::new("Time"),
        Cell::new(format!("{:.1}s", outcome.elapsed.as_secs_f64())),
    ]);
    eprintln!("\n{table}");

    eprintln!("{}", outcome.profile.format_table());

    if preview > 0 && outcome.graph.node_count() > 0 {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Work").fg(Color::Cyan),
                Cell::new("Level").fg(Color::Cyan),
                Cell::new("Year").fg(Color::Cyan),
                Cell::new("Title").fg(Color::Cyan),
            ]);
        for node in outcome.graph.nodes().iter().take(preview) {
            table.add_row(vec![
                Cell::new(&node.id),
                Cell::new(node.level),
                Cell::new(
                    node.meta
                        .publication_year
                        .map_or(String::new(), |y| y.to_string()),
                ),
                Cell::new(truncate(node.meta.title.as_deref().unwrap_or(""), 60)),
            ]);
        }
        let shown = preview.min(outcome.graph.node_count());
        eprintln!("\n{table}");
        if shown < outcome.graph.node_count() {
            progress.println(format!(
                "  ... and {} more nodes",
                fmt_num(outcome.graph.node_count() - shown)
            ));
        }
    }
}

fn status_cell(termination: &Termination) -> Cell {
    let color = match termination {
        Termination::Exhausted | Termination::LevelCap | Termination::NodeCap => Color::Green,
        Termination::Cancelled { .. } => Color::Yellow,
        Termination::Aborted { .. } => Color::Red,
    };
    Cell::new(termination.to_string()).fg(color)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
