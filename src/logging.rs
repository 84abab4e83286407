// src/logging.rs
// tracing setup shared by both binaries: compact lines on stderr, plus a
// plain-text debug log next to the snapshot store.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::fmt::{self, time};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Default)]
pub struct LogOptions {
    /// `-v` count: 0 = info, 1 = debug for this crate, 2+ = trace.
    pub verbose: u8,
    /// Append a copy of every event here (typically `<store>/debug.log`).
    pub file: Option<PathBuf>,
    /// Skip the stderr layer (the desktop viewer has no console).
    pub quiet: bool,
}

/// Filter from `RUST_LOG`, else from the verbosity count.
pub fn filter_for(verbose: u8) -> EnvFilter {
    let fallback = match verbose {
        0 => "info",
        1 => "info,toscrape=debug",
        _ => "debug,toscrape=trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Calling it twice is harmless; the second
/// call is ignored. A log file that cannot be opened is skipped.
pub fn init(opts: &LogOptions) {
    let file = opts.file.as_ref().and_then(|path| {
        if let Some(dir) = path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    let file_layer = file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_timer(time::uptime())
            .with_writer(Mutex::new(f))
    });
    let stderr_layer = (!opts.quiet).then(|| fmt::layer().with_writer(std::io::stderr).compact());

    let _ = tracing_subscriber::registry()
        .with(filter_for(opts.verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}
