// src/error.rs
//! Error types, one enum per concern.
//!
//! Page-level problems (`PageError`, `NetError`, `RenderError`) are recovered
//! inside the adapters and only escalate as `FetchError` once the
//! consecutive-failure budget is spent. Everything the outer layers see is
//! one of `FetchError`, `StoreError`, `DiffError` or `RunError`.

use std::path::PathBuf;
use std::time::Duration;

use crate::record::SourceId;

/// Unrecoverable failure of one adapter fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// More consecutive pages failed than the configured budget allows.
    #[error("{source_id}: {failures} consecutive page failures (last at page {page})")]
    TooManyFailures {
        source_id: SourceId,
        page: u32,
        failures: u32,
    },

    /// Pages were requested but not a single one loaded.
    #[error("{source_id}: no listing page could be loaded ({failures} failed)")]
    NoPagesLoaded { source_id: SourceId, failures: u32 },

    /// HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(String),

    /// Renderer could not be started at all.
    #[error("renderer unavailable: {0}")]
    Render(#[from] RenderError),
}

/// Failure of a single listing page. Logged and skipped by the pager.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("no records could be extracted ({0})")]
    Empty(String),

    #[error("page {page} not found")]
    NotFound { page: u32 },
}

/// HTTP-level failure after retries.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("GET {url}: status {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url}: disallowed by robots.txt")]
    Disallowed { url: String },

    #[error("GET {url}: gave up after {attempts} attempts: {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
}

/// Failure to obtain rendered markup for one page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render of {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("render of {url} produced no content")]
    Empty { url: String },

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("render of {url} failed: {reason}")]
    Browser { url: String, reason: String },
}

impl RenderError {
    /// Timeouts and empty renders are worth another attempt; browser faults are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RenderError::Timeout { .. } | RenderError::Empty { .. })
    }
}

/// Violations of the snapshot identity invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("duplicate identity key {key:?} in {source_id} snapshot")]
    DuplicateKey { source_id: SourceId, key: String },

    #[error("record {key:?} belongs to {found}, not {expected}")]
    ForeignRecord {
        key: String,
        expected: SourceId,
        found: SourceId,
    },
}

/// Snapshot store I/O and format failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid snapshot label {0:?}")]
    InvalidLabel(String),

    #[error("cannot tell which source {} belongs to", .0.display())]
    UnknownSource(PathBuf),

    #[error("no current snapshot for {0} to archive")]
    NothingToArchive(SourceId),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

/// Diff engine failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error("cannot diff a {old} snapshot against a {new} snapshot")]
    SourceMismatch { old: SourceId, new: SourceId },
}

/// Failure of one incremental crawl run. The store is untouched in every case
/// except a late `Store` error, where the previous snapshot is still intact.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("a run for {0} is already in progress")]
    InProgress(SourceId),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Merge(#[from] SnapshotError),

    #[error("run task for {source_id} died: {reason}")]
    Task { source_id: SourceId, reason: String },
}

/// Failure while comparing two stored snapshots or writing the report files.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("no {label:?} snapshot stored for {source_id}")]
    MissingSnapshot { source_id: SourceId, label: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("summary serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure loading `toscrape.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
