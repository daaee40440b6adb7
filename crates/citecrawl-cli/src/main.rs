//! citecrawl - citation cascade extraction CLI
//!
//! Crawls the citation graph reachable from seed OpenAlex works, level by
//! level, and reports the assembled graph and fetch profile.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use citecrawl_core::CancelToken;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "citecrawl")]
#[command(about = "Citation cascade extraction from OpenAlex")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./citecrawl.toml or ~/.config/citecrawl/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the citation cascade from seed works
    Cascade(cmd::cascade::CascadeArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(citecrawl_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    citecrawl_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Cascade(args) => {
            let cancel = CancelToken::new();
            setup_signal_handler(&cancel);
            cmd::cascade::run(args, &config, &progress, &cancel)
        }
        Command::Config => {
            config.print_table();
            Ok(())
        }
    }
}

fn setup_signal_handler(cancel: &CancelToken) {
    // First signal: cooperative cancellation (partial results are kept)
    // Second signal: force exit
    // SAFETY: CancelToken::cancel and process::exit are async-signal-safe
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        let cancel = cancel.clone();
        unsafe {
            signal_hook::low_level::register(signal, move || {
                if cancel.cancel() {
                    std::process::exit(130);
                }
            })
            .expect("Failed to register signal handler");
        }
    }
}
