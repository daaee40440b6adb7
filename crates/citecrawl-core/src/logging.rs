//! Logging setup with indicatif integration

use std::io::Write;

use indicatif::MultiProgress;

fn level_label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

fn level_color(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Logger that prints through indicatif MultiProgress so log lines do not
/// tear active progress bars. Only used in TTY mode.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let label = level_label(record.level());
            let color = level_color(record.level());
            let line = format!("[{color}{label}\x1b[0m] {}", record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize the log facade.
///
/// TTY mode (`multi` present): colored output routed through the progress
/// bars. Non-TTY: plain level labels, no ANSI codes.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().default_filter_or(default_level);

    match multi {
        Some(multi) => {
            let inner = env_logger::Builder::from_env(env).build();
            let max_level = inner.filter();
            log::set_boxed_logger(Box::new(IndicatifLogger {
                inner,
                multi: multi.clone(),
            }))
            .expect("failed to init logger");
            log::set_max_level(max_level);
        }
        None => {
            env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "[{}] {}",
                        level_label(record.level()),
                        record.args()
                    )
                })
                .init();
        }
    }
}
