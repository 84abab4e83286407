// src/config/options.rs
//! Runtime options. Every field has a default from `consts`; a
//! `toscrape.toml` may override any subset, and the CLI overrides that.
//!
//! ```toml
//! [store]
//! root = ".store"
//! retain_previous = true
//!
//! [crawl]
//! workers = 4
//! max_consecutive_failures = 3
//! respect_robots = true
//!
//! [books]
//! details = false
//!
//! [render]
//! timeout_secs = 10
//! retries = 2
//!
//! [quotes]
//! record_limit = 50
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::consts::*;
use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppOptions {
    pub store: StoreOptions,
    pub crawl: CrawlOptions,
    pub render: RenderOptions,
    pub books: BooksOptions,
    pub quotes: QuotesOptions,
}

impl AppOptions {
    /// Load options. An explicit `path` must exist; otherwise `toscrape.toml`
    /// in the working directory is used when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    pub root: PathBuf,
    /// Keep the replaced snapshot as `previous.csv` on every save.
    pub retain_previous: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { root: PathBuf::from(STORE_DIR), retain_previous: true }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlOptions {
    /// Pages fetched concurrently within one source.
    pub workers: usize,
    /// Consecutive failed pages tolerated before the fetch is abandoned.
    pub max_consecutive_failures: u32,
    pub request_pause_ms: u64,
    pub http_retries: u32,
    pub http_timeout_secs: u64,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
    /// Consult each origin's robots.txt before fetching from it.
    pub respect_robots: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            workers: WORKERS,
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
            request_pause_ms: REQUEST_PAUSE_MS,
            http_retries: HTTP_RETRIES,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            user_agent: s!(USER_AGENT),
            respect_robots: true,
        }
    }
}

impl CrawlOptions {
    pub fn pause(&self, page: u32) -> Duration {
        if self.request_pause_ms == 0 {
            return Duration::ZERO;
        }
        let jitter = u64::from(page) % JITTER_MS;
        Duration::from_millis(self.request_pause_ms + jitter)
    }

    pub fn workers(&self) -> usize { self.workers.max(1) }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    pub timeout_secs: u64,
    /// Extra attempts after an empty or timed-out render.
    pub retries: u32,
    pub headless: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { timeout_secs: RENDER_TIMEOUT_SECS, retries: RENDER_RETRIES, headless: true }
    }
}

impl RenderOptions {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs.max(1)) }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BooksOptions {
    pub base_url: String,
    /// Visit every book's detail page for its category and UPC.
    pub details: bool,
}

impl Default for BooksOptions {
    fn default() -> Self {
        Self { base_url: s!(BOOKS_BASE_URL), details: true }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotesOptions {
    pub base_url: String,
    /// Stop once this many quotes were collected.
    pub record_limit: Option<usize>,
}

impl Default for QuotesOptions {
    fn default() -> Self {
        Self { base_url: s!(QUOTES_BASE_URL), record_limit: None }
    }
}
