// src/cli.rs
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;

use crate::config::consts::{CURRENT_LABEL, DEFAULT_PAGES, DEFAULT_REPORT_DIR, LOG_FILE, PREVIOUS_LABEL};
use crate::config::options::AppOptions;
use crate::crawler::{block_on, CrawlJob, Crawler};
use crate::diff::DiffResult;
use crate::logging::{self, LogOptions};
use crate::progress::Progress;
use crate::record::SourceId;
use crate::report;
use crate::source::adapter_for;
use crate::store::SnapshotStore;

/// Incremental crawler for books.toscrape.com and quotes.toscrape.com.
#[derive(Debug, Parser)]
#[command(name = "toscrape", version, about, long_about = None)]
pub struct Cli {
    /// Options file (default: ./toscrape.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Snapshot store directory
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the first N listing pages and merge them into the current snapshot
    Crawl {
        #[arg(long, value_enum, default_value_t = Which::All)]
        source: Which,
        /// Listing pages per source; 0 or less fetches nothing
        #[arg(long, default_value_t = DEFAULT_PAGES, allow_negative_numbers = true)]
        pages: i64,
        /// Stop the quotes crawl after this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare two stored snapshots of one source
    Diff {
        #[arg(long)]
        source: Option<SourceId>,
        #[arg(long, default_value = PREVIOUS_LABEL)]
        baseline: String,
        #[arg(long, default_value = CURRENT_LABEL)]
        latest: String,
        /// Compare two snapshot files instead of stored labels
        #[arg(long, num_args = 2, value_names = ["OLD", "NEW"], conflicts_with_all = ["source"])]
        files: Option<Vec<PathBuf>>,
        /// Also write summary_<source>.json and diff_<source>_<date>.csv here
        /// (bare flag: ./reports)
        #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = DEFAULT_REPORT_DIR)]
        report_dir: Option<PathBuf>,
        /// Print the full diff as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the current snapshot to a named label
    Archive {
        #[arg(long)]
        source: SourceId,
        /// Defaults to today's date (YYYYMMDD)
        #[arg(long)]
        label: Option<String>,
    },
    /// List stored snapshot labels
    Labels {
        #[arg(long)]
        source: SourceId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Which {
    #[value(alias = "static")]
    Books,
    #[value(alias = "dynamic")]
    Quotes,
    All,
}

impl Which {
    pub fn sources(self) -> Vec<SourceId> {
        match self {
            Which::Books => vec![SourceId::Static],
            Which::Quotes => vec![SourceId::Dynamic],
            Which::All => SourceId::ALL.to_vec(),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut opts = AppOptions::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.store {
        opts.store.root = dir.clone();
    }
    logging::init(&LogOptions {
        verbose: cli.verbose,
        file: Some(opts.store.root.join(LOG_FILE)),
        quiet: false,
    });

    let store = SnapshotStore::new(&opts.store.root).with_retain_previous(opts.store.retain_previous);

    match cli.command {
        Command::Crawl { source, pages, limit } => {
            if limit.is_some() {
                opts.quotes.record_limit = limit;
            }
            crawl(&opts, store, source.sources(), pages)
        }
        Command::Diff { source, baseline, latest, files, report_dir, json } => {
            let (result, baseline, latest) = match files.as_deref() {
                Some([old, new]) => (
                    report::compare_files(old, new)?,
                    old.display().to_string(),
                    new.display().to_string(),
                ),
                Some(_) => bail!("--files takes exactly two paths"),
                None => {
                    let source = source.ok_or_else(|| eyre!("--source or --files is required"))?;
                    (report::compare(&store, source, &baseline, &latest)?, baseline, latest)
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_diff(&result, &baseline, &latest);
            }
            if let Some(dir) = report_dir {
                let paths = report::write_report(&dir, &result, &baseline, &latest)?;
                eprintln!("Wrote {} and {}", paths.summary.display(), paths.diff.display());
            }
            Ok(())
        }
        Command::Archive { source, label } => {
            let label = label.unwrap_or_else(|| chrono::Local::now().format("%Y%m%d").to_string());
            let path = store.archive(source, &label)?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Labels { source } => {
            for label in store.labels(source)? {
                println!("{label}");
            }
            Ok(())
        }
    }
}

fn crawl(opts: &AppOptions, store: SnapshotStore, sources: Vec<SourceId>, pages: i64) -> Result<()> {
    let jobs = sources
        .into_iter()
        .map(|s| Ok(CrawlJob { adapter: adapter_for(s, opts)?, pages }))
        .collect::<Result<Vec<_>>>()?;

    let crawler = Crawler::new(store);
    let results = block_on(crawler.run_all(jobs, Arc::new(CliProgress)))
        .wrap_err("starting async runtime")?;

    let mut failed = 0;
    for (source, result) in results {
        match result {
            Ok(r) if r.saved => println!(
                "{source}: {} fetched, {} added, {} updated, {} unchanged, {} kept; {} total -> {}",
                r.stats.fetched,
                r.stats.added,
                r.stats.updated,
                r.stats.unchanged,
                r.stats.retained,
                r.total,
                r.path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
            ),
            Ok(r) => println!("{source}: nothing fetched, snapshot unchanged ({} records)", r.total),
            Err(e) => {
                failed += 1;
                eprintln!("{source}: run failed: {e}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} source(s) failed; their snapshots were left untouched");
    }
    Ok(())
}

fn print_diff(d: &DiffResult, baseline: &str, latest: &str) {
    let c = d.counts();
    println!(
        "{} {baseline} -> {latest}: {} added, {} removed, {} changed, {} unchanged",
        d.source, c.added, c.removed, c.changed, c.unchanged
    );
    for r in &d.added {
        println!("+ {}", r.key);
    }
    for r in &d.removed {
        println!("- {}", r.key);
    }
    for ch in &d.changed {
        println!("~ {}", ch.key);
        for delta in &ch.deltas {
            let show = |v: &Option<crate::record::FieldValue>| v.as_ref().map_or(s!("(none)"), |v| v.to_string());
            println!("    {}: {} -> {}", delta.field, show(&delta.before), show(&delta.after));
        }
    }
}

/// Page-level progress on stderr.
struct CliProgress;

impl Progress for CliProgress {
    fn page_done(&self, source: SourceId, page: u32, records: usize) {
        eprintln!("{source}: page {page} -> {records} records");
    }

    fn page_failed(&self, source: SourceId, page: u32, reason: &str) {
        eprintln!("{source}: page {page} skipped ({reason})");
    }
}
