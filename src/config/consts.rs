// src/config/consts.rs

// Sites
pub const BOOKS_BASE_URL: &str = "https://books.toscrape.com/";
pub const BOOKS_PAGE_PATH: &str = "catalogue/page-{n}.html";
pub const QUOTES_BASE_URL: &str = "https://quotes.toscrape.com/";
pub const QUOTES_FIRST_PAGE_PATH: &str = "js/";
pub const QUOTES_PAGE_PATH: &str = "js/page/{n}/";
pub const USER_AGENT: &str = "toscrape/0.3 (+incremental crawler)";

// Local store
pub const STORE_DIR: &str = ".store";
pub const STORE_SEP: char = ',';
pub const CURRENT_LABEL: &str = "current";
pub const PREVIOUS_LABEL: &str = "previous";
pub const KEY_COLUMN: &str = "identity_key";
pub const TIME_COLUMN: &str = "fetched_at";
pub const LOG_FILE: &str = "debug.log";
pub const CONFIG_FILE: &str = "toscrape.toml";

// Reports
pub const DEFAULT_REPORT_DIR: &str = "reports";

// Concurrency
pub const WORKERS: usize = 4;
pub const REQUEST_PAUSE_MS: u64 = 75; // be polite
pub const JITTER_MS: u64 = 50; // extra 0..50 ms

// Failure policy
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const HTTP_RETRIES: u32 = 4;
pub const HTTP_TIMEOUT_SECS: u64 = 20;
pub const RETRY_BASE_DELAY_MS: u64 = 500;

// Rendering
pub const RENDER_TIMEOUT_SECS: u64 = 10;
pub const RENDER_RETRIES: u32 = 2;
pub const QUOTE_READY_SELECTOR: &str = ".quote";

// CLI defaults
pub const DEFAULT_PAGES: i64 = 5;
