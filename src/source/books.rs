// src/source/books.rs
//! Static paginated catalogue (books.toscrape.com).
//!
//! Each listing page is plain HTML with 20 `article.product_pod` cards.
//! The identity key is the detail-page slug, which the site keeps stable
//! across price and stock changes. With `books.details` on, every book's
//! detail page is fetched as well for its category and UPC.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use super::pager::{crawl_pages, PageOutcome, PagerPolicy};
use super::SourceAdapter;
use crate::config::consts::BOOKS_PAGE_PATH;
use crate::config::options::{AppOptions, CrawlOptions};
use crate::core::html::{first, first_attr, first_text, has_next_link, select_all, text_of};
use crate::core::net::{Fetched, HttpClient};
use crate::core::sanitize::{parse_price, rating_from_class, slug_from_path};
use crate::error::{FetchError, PageError};
use crate::progress::Progress;
use crate::record::{FieldValue, Record, SourceId};

pub struct BooksSource {
    http: HttpClient,
    base: Url,
    crawl: CrawlOptions,
    details: bool,
}

/// Fields only the detail page carries.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BookDetail {
    pub category: Option<String>,
    pub upc: Option<String>,
}

impl BooksSource {
    pub fn new(opts: &AppOptions) -> Result<Self, FetchError> {
        let base = Url::parse(&opts.books.base_url)
            .map_err(|e| FetchError::Client(format!("books base url {:?}: {e}", opts.books.base_url)))?;
        Ok(Self {
            http: HttpClient::new(&opts.crawl)?,
            base,
            crawl: opts.crawl.clone(),
            details: opts.books.details,
        })
    }

    pub fn page_url(&self, page: u32) -> Result<Url, PageError> {
        let path = BOOKS_PAGE_PATH.replace("{n}", &page.to_string());
        self.base.join(&path).map_err(|e| PageError::Empty(format!("bad page url {path}: {e}")))
    }

    async fn fetch_page(&self, page: u32) -> Result<PageOutcome, PageError> {
        tokio::time::sleep(self.crawl.pause(page)).await;
        let url = self.page_url(page)?;
        let mut outcome = match self.http.get(url.as_str()).await? {
            Fetched::NotFound => {
                debug!(page, "listing page not found");
                return Ok(PageOutcome::not_found());
            }
            Fetched::Page(body) => parse_listing(&body, &url, Utc::now())?,
        };
        if !self.details {
            return Ok(outcome);
        }

        let mut enriched = Vec::with_capacity(outcome.records.len());
        for rec in std::mem::take(&mut outcome.records) {
            if let Some(rec) = self.enrich(page, rec).await {
                enriched.push(rec);
            }
        }
        if enriched.is_empty() {
            return Err(PageError::Empty(format!("no book on {url} has a detail page")));
        }
        outcome.records = enriched;
        Ok(outcome)
    }

    /// Add category and UPC from the detail page. A book whose detail page
    /// is gone is dropped; any other failure keeps the listing fields.
    async fn enrich(&self, page: u32, rec: Record) -> Option<Record> {
        let Some(url) = rec.get("url").and_then(FieldValue::as_text).map(str::to_string) else {
            return Some(rec);
        };
        tokio::time::sleep(self.crawl.pause(page)).await;
        match self.http.get(&url).await {
            Ok(Fetched::Page(body)) => {
                let detail = parse_detail(&body);
                Some(
                    rec.with("category", detail.category.unwrap_or_default())
                        .with("upc", detail.upc.unwrap_or_default()),
                )
            }
            Ok(Fetched::NotFound) => {
                warn!(key = %rec.key, %url, "detail page not found, book skipped");
                None
            }
            Err(e) => {
                warn!(key = %rec.key, error = %e, "detail page failed, keeping listing fields");
                Some(rec)
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for BooksSource {
    fn source(&self) -> SourceId { SourceId::Static }

    async fn fetch(&self, pages: i64, progress: &dyn Progress) -> Result<Vec<Record>, FetchError> {
        let policy = PagerPolicy {
            workers: self.crawl.workers(),
            max_consecutive_failures: self.crawl.max_consecutive_failures,
            record_limit: None,
        };
        crawl_pages(SourceId::Static, pages, policy, progress, |page| self.fetch_page(page)).await
    }
}

/// Extract every product card of one listing page. Cards missing a
/// required field are logged and skipped; a page where no card survives
/// is a failed page.
pub fn parse_listing(html: &str, page_url: &Url, fetched_at: DateTime<Utc>) -> Result<PageOutcome, PageError> {
    let doc = Html::parse_document(html);
    let cards = select_all(&doc, "article.product_pod");
    if cards.is_empty() {
        return Err(PageError::Empty(format!("no product cards on {page_url}")));
    }

    let mut records = Vec::with_capacity(cards.len());
    for (i, card) in cards.into_iter().enumerate() {
        match parse_card(card, page_url, fetched_at) {
            Ok(rec) => records.push(rec),
            Err(reason) => warn!(page = %page_url, card = i, %reason, "card skipped"),
        }
    }
    if records.is_empty() {
        return Err(PageError::Empty(format!("every card on {page_url} was malformed")));
    }

    Ok(PageOutcome { records, last_page: !has_next_link(&doc), missing: false })
}

/// UPC from the product table, category from the breadcrumb
/// (Home > Books > Category > Title).
pub fn parse_detail(html: &str) -> BookDetail {
    let doc = Html::parse_document(html);

    let upc = select_all(&doc, "table.table-striped tr").into_iter().find_map(|row| {
        let head = first_text(row, "th")?;
        if head.eq_ignore_ascii_case("upc") { first_text(row, "td") } else { None }
    });

    let links = select_all(&doc, "ul.breadcrumb li a");
    let mut category = (links.len() >= 2)
        .then(|| links.last().map(|a| text_of(*a)))
        .flatten()
        .filter(|c| !c.is_empty());
    if category.is_none() {
        // no links: second-to-last crumb is the category
        let items = select_all(&doc, "ul.breadcrumb li");
        if items.len() >= 3 {
            category = Some(text_of(items[items.len() - 2])).filter(|c| !c.is_empty());
        }
    }

    BookDetail { category, upc }
}

fn parse_card(card: ElementRef<'_>, page_url: &Url, fetched_at: DateTime<Utc>) -> Result<Record, String> {
    let href = first_attr(card, "h3 a", "href").ok_or("missing detail link")?;
    let url = page_url.join(&href).map_err(|e| format!("detail link {href:?}: {e}"))?;
    let key = slug_from_path(url.path()).ok_or_else(|| format!("no slug in {url}"))?;

    // The visible link text is truncated; the title attribute is not.
    let title = first_attr(card, "h3 a", "title")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| first_text(card, "h3 a"))
        .ok_or("missing title")?;

    let price_text = first_text(card, ".price_color").ok_or("missing price")?;
    let price = parse_price(&price_text).ok_or_else(|| format!("unparseable price {price_text:?}"))?;

    let mut rec = Record::new(SourceId::Static, key, fetched_at)
        .with("title", title)
        .with("price", price)
        .with("availability", first_text(card, ".availability").unwrap_or_default())
        .with("url", url.to_string());

    let class = first(card, "p.star-rating").and_then(|el| el.value().attr("class").map(str::to_string));
    if let Some(rating) = class.as_deref().and_then(rating_from_class) {
        rec = rec.with("rating", rating);
    }
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn card(slug: &str, title: &str, price: &str, stars: &str) -> String {
        format!(
            r#"<article class="product_pod">
                <p class="star-rating {stars}"><i class="icon-star"></i></p>
                <h3><a href="{slug}/index.html" title="{title}">{title}</a></h3>
                <div class="product_price">
                    <p class="price_color">{price}</p>
                    <p class="instock availability"><i class="icon-ok"></i>
                        In stock
                    </p>
                </div>
            </article>"#
        )
    }

    fn page(cards: &[String], next: bool) -> String {
        let pager = if next { r#"<li class="next"><a href="page-2.html">next</a></li>"# } else { "" };
        format!("<html><body><ol class=\"row\">{}</ol><ul class=\"pager\">{pager}</ul></body></html>", cards.join("\n"))
    }

    fn base() -> Url { Url::parse("https://books.toscrape.com/catalogue/page-1.html").unwrap() }

    #[test]
    fn cards_become_records() {
        let html = page(&[card("a-light-in-the-attic_1000", "A Light in the Attic", "£51.77", "Three")], true);
        let out = parse_listing(&html, &base(), Utc::now()).unwrap();
        assert!(!out.last_page);
        let rec = &out.records[0];
        assert_eq!(rec.key, "a-light-in-the-attic_1000");
        assert_eq!(rec.get("title"), Some(&FieldValue::from("A Light in the Attic")));
        assert_eq!(rec.get("price"), Some(&FieldValue::Number(51.77)));
        assert_eq!(rec.get("rating"), Some(&FieldValue::Integer(3)));
        assert_eq!(rec.get("availability"), Some(&FieldValue::from("In stock")));
        assert_eq!(
            rec.get("url"),
            Some(&FieldValue::from("https://books.toscrape.com/catalogue/a-light-in-the-attic_1000/index.html"))
        );
    }

    #[test]
    fn malformed_cards_are_skipped() {
        let html = page(&[card("good_1", "Good", "£10.00", "One"), card("bad_2", "Bad", "n/a", "Two")], false);
        let out = parse_listing(&html, &base(), Utc::now()).unwrap();
        assert!(out.last_page);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].key, "good_1");
    }

    #[test]
    fn page_without_usable_cards_fails() {
        let only_bad = page(&[card("bad_2", "Bad", "n/a", "Two")], false);
        assert!(parse_listing(&only_bad, &base(), Utc::now()).is_err());
        assert!(parse_listing("<html><body>maintenance</body></html>", &base(), Utc::now()).is_err());
    }

    #[test]
    fn detail_page_gives_category_and_upc() {
        let html = r#"<ul class="breadcrumb">
                <li><a href="../../index.html">Home</a></li>
                <li><a href="../category/books_1/index.html">Books</a></li>
                <li><a href="../category/books/poetry_23/index.html">Poetry</a></li>
                <li class="active">A Light in the Attic</li>
            </ul>
            <table class="table table-striped">
                <tr><th>UPC</th><td>a897fe39b1053632</td></tr>
                <tr><th>Product Type</th><td>Books</td></tr>
            </table>"#;
        let d = parse_detail(html);
        assert_eq!(d.category.as_deref(), Some("Poetry"));
        assert_eq!(d.upc.as_deref(), Some("a897fe39b1053632"));

        assert_eq!(parse_detail("<p>gone</p>"), BookDetail::default());
    }

    #[test]
    fn page_urls_follow_catalogue_layout() {
        let src = BooksSource::new(&AppOptions::default()).unwrap();
        assert_eq!(src.page_url(3).unwrap().as_str(), "https://books.toscrape.com/catalogue/page-3.html");
    }
}
