// src/source/mod.rs
//! Source adapters: one per site, all behind `SourceAdapter`.

pub mod books;
pub mod pager;
pub mod quotes;
pub mod render;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::options::AppOptions;
use crate::error::FetchError;
use crate::progress::Progress;
use crate::record::{Record, SourceId};

pub use books::BooksSource;
pub use pager::PageOutcome;
pub use quotes::QuotesSource;
pub use render::Renderer;

/// Fetch records from one site.
///
/// `pages` is the number of listing pages to visit from the first; zero or
/// less returns an empty list without any request. Individual page failures
/// are skipped; only exceeding the consecutive-failure budget is an error.
/// Records come back in listing order and may repeat a key.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    async fn fetch(&self, pages: i64, progress: &dyn Progress) -> Result<Vec<Record>, FetchError>;
}

/// Production adapter for `source`.
pub fn adapter_for(source: SourceId, opts: &AppOptions) -> Result<Arc<dyn SourceAdapter>, FetchError> {
    match source {
        SourceId::Static => Ok(Arc::new(BooksSource::new(opts)?)),
        SourceId::Dynamic => dynamic_adapter(opts),
    }
}

#[cfg(feature = "chrome")]
fn dynamic_adapter(opts: &AppOptions) -> Result<Arc<dyn SourceAdapter>, FetchError> {
    Ok(Arc::new(QuotesSource::with_chrome(opts)?))
}

#[cfg(not(feature = "chrome"))]
fn dynamic_adapter(_opts: &AppOptions) -> Result<Arc<dyn SourceAdapter>, FetchError> {
    Err(FetchError::Render(crate::error::RenderError::Launch(s!(
        "built without the `chrome` feature; no renderer available"
    ))))
}
