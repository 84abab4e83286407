// src/source/quotes.rs
//! Script-rendered listing (quotes.toscrape.com/js/).
//!
//! The raw response carries no quotes; they are inserted by script, so
//! every page goes through a `Renderer` and waits for `.quote` to appear.
//! Quotes have no natural id, so the identity key is a hash of the
//! normalized text and author.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use super::pager::{crawl_pages, PageOutcome, PagerPolicy};
use super::render::Renderer;
use super::SourceAdapter;
use crate::config::consts::{QUOTE_READY_SELECTOR, QUOTES_FIRST_PAGE_PATH, QUOTES_PAGE_PATH};
use crate::config::options::{AppOptions, CrawlOptions, RenderOptions};
use crate::core::html::{first_text, has_next_link, select_all, select_in, text_of};
use crate::core::sanitize::strip_quote_marks;
use crate::error::{FetchError, PageError, RenderError};
use crate::progress::Progress;
use crate::record::{Record, SourceId};

/// Extra time granted over the render timeout before the adapter gives up
/// on a renderer that ignores its own deadline.
const RENDER_GRACE: Duration = Duration::from_secs(5);

pub struct QuotesSource {
    renderer: Arc<dyn Renderer>,
    base: Url,
    crawl: CrawlOptions,
    render: RenderOptions,
    record_limit: Option<usize>,
}

impl QuotesSource {
    pub fn new(opts: &AppOptions, renderer: Arc<dyn Renderer>) -> Result<Self, FetchError> {
        let base = Url::parse(&opts.quotes.base_url)
            .map_err(|e| FetchError::Client(format!("quotes base url {:?}: {e}", opts.quotes.base_url)))?;
        Ok(Self {
            renderer,
            base,
            crawl: opts.crawl.clone(),
            render: opts.render.clone(),
            record_limit: opts.quotes.record_limit,
        })
    }

    /// Adapter backed by a lazily launched headless Chrome.
    #[cfg(feature = "chrome")]
    pub fn with_chrome(opts: &AppOptions) -> Result<Self, FetchError> {
        let renderer = super::render::ChromeRenderer::new(opts.render.headless, opts.crawl.user_agent.clone());
        Self::new(opts, Arc::new(renderer))
    }

    pub fn page_url(&self, page: u32) -> Result<Url, PageError> {
        let path = if page <= 1 { s!(QUOTES_FIRST_PAGE_PATH) } else { QUOTES_PAGE_PATH.replace("{n}", &page.to_string()) };
        self.base.join(&path).map_err(|e| PageError::Empty(format!("bad page url {path}: {e}")))
    }

    async fn fetch_page(&self, page: u32) -> Result<PageOutcome, PageError> {
        let url = self.page_url(page)?;
        let timeout = self.render.timeout();
        let attempts = self.render.retries + 1;
        let mut last = PageError::Render(RenderError::Empty { url: url.to_string() });

        for attempt in 1..=attempts {
            tokio::time::sleep(self.crawl.pause(page)).await;
            let rendered = tokio::time::timeout(
                timeout + RENDER_GRACE,
                self.renderer.render(url.as_str(), QUOTE_READY_SELECTOR, timeout),
            )
            .await
            .unwrap_or_else(|_| Err(RenderError::Timeout { url: url.to_string(), after: timeout }));

            match rendered {
                Ok(html) => match parse_quotes(&html, Utc::now()) {
                    Ok(outcome) => return Ok(outcome),
                    Err(e) => last = e,
                },
                Err(e) if e.is_retryable() => last = e.into(),
                Err(e) => return Err(e.into()),
            }
            if attempt < attempts {
                warn!(page, attempt, reason = %last, "render unusable, retrying");
            }
        }
        Err(last)
    }
}

#[async_trait]
impl SourceAdapter for QuotesSource {
    fn source(&self) -> SourceId { SourceId::Dynamic }

    async fn fetch(&self, pages: i64, progress: &dyn Progress) -> Result<Vec<Record>, FetchError> {
        let policy = PagerPolicy {
            workers: self.crawl.workers(),
            max_consecutive_failures: self.crawl.max_consecutive_failures,
            record_limit: self.record_limit,
        };
        crawl_pages(SourceId::Dynamic, pages, policy, progress, |page| self.fetch_page(page)).await
    }
}

/// Identity of a quote: hash of the trimmed text and author.
pub fn quote_key(text: &str, author: &str) -> String {
    let joined = format!("{}|{}", text.trim(), author.trim());
    let hex = blake3::hash(joined.as_bytes()).to_hex();
    hex.as_str()[..32].to_string()
}

/// Extract quotes from rendered markup. No quote blocks at all means the
/// render was not ready, which the caller retries.
pub fn parse_quotes(html: &str, fetched_at: DateTime<Utc>) -> Result<PageOutcome, PageError> {
    let doc = Html::parse_document(html);
    let blocks = select_all(&doc, "div.quote");
    if blocks.is_empty() {
        return Err(PageError::Empty(s!("rendered page has no quotes")));
    }

    let mut records = Vec::with_capacity(blocks.len());
    for (i, block) in blocks.into_iter().enumerate() {
        match parse_block(block, fetched_at) {
            Some(rec) => records.push(rec),
            None => warn!(block = i, "quote without text or author skipped"),
        }
    }
    if records.is_empty() {
        return Err(PageError::Empty(s!("every quote block was malformed")));
    }
    debug!(quotes = records.len(), "page parsed");

    Ok(PageOutcome { records, last_page: !has_next_link(&doc), missing: false })
}

fn parse_block(block: ElementRef<'_>, fetched_at: DateTime<Utc>) -> Option<Record> {
    let text = strip_quote_marks(&first_text(block, "span.text")?);
    let author = first_text(block, "small.author")?;
    if text.is_empty() {
        return None;
    }
    let tags: Vec<String> = select_in(block, ".tags a.tag").into_iter().map(text_of).filter(|t| !t.is_empty()).collect();
    let length = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);

    Some(
        Record::new(SourceId::Dynamic, quote_key(&text, &author), fetched_at)
            .with("text", text)
            .with("author", author)
            .with("tags", tags.join(","))
            .with("length", length),
    )
}
