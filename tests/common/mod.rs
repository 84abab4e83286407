// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use toscrape::config::options::AppOptions;
use toscrape::error::RenderError;
use toscrape::record::{Record, SourceId};
use toscrape::source::Renderer;
use tokio::sync::Mutex;

/// Options tuned for fast tests against a local mock server.
pub fn fast_options(base_url: &str) -> AppOptions {
    let mut opts = AppOptions::default();
    opts.books.base_url = format!("{}/", base_url.trim_end_matches('/'));
    opts.quotes.base_url = opts.books.base_url.clone();
    opts.books.details = false;
    opts.crawl.request_pause_ms = 0;
    opts.crawl.retry_base_delay_ms = 1;
    opts.crawl.http_retries = 1;
    opts.crawl.workers = 2;
    opts.render.timeout_secs = 1;
    opts
}

pub fn book_card(slug: &str, title: &str, price: &str, stars: &str) -> String {
    format!(
        r#"<article class="product_pod">
            <p class="star-rating {stars}"></p>
            <h3><a href="{slug}/index.html" title="{title}">{title}</a></h3>
            <p class="price_color">{price}</p>
            <p class="instock availability">In stock</p>
        </article>"#
    )
}

pub fn book_page(cards: &[String], has_next: bool) -> String {
    let next = if has_next { r#"<li class="next"><a href="page-n.html">next</a></li>"# } else { "" };
    format!(
        "<html><body><section><ol class=\"row\">{}</ol></section><ul class=\"pager\">{next}</ul></body></html>",
        cards.join("\n")
    )
}

pub fn quote_block(text: &str, author: &str, tags: &[&str]) -> String {
    let tags: String = tags.iter().map(|t| format!(r#"<a class="tag" href="/tag/{t}/">{t}</a>"#)).collect();
    format!(
        r#"<div class="quote"><span class="text">“{text}”</span>
           <span>by <small class="author">{author}</small></span>
           <div class="tags">{tags}</div></div>"#
    )
}

pub fn quote_page(blocks: &[String], has_next: bool) -> String {
    let next = if has_next { r#"<li class="next"><a href="/js/page/2/">Next</a></li>"# } else { "" };
    format!("<div class=\"container\">{}<nav><ul class=\"pager\">{next}</ul></nav></div>", blocks.join("\n"))
}

pub fn book(key: &str, title: &str, price: f64) -> Record {
    Record::new(SourceId::Static, key, Utc::now()).with("title", title).with("price", price)
}

/// One scripted step of a fake renderer.
#[derive(Clone, Debug)]
pub enum Step {
    Html(String),
    Empty,
    Timeout,
    Hang,
}

/// Renderer that answers each call from a script keyed by URL suffix,
/// falling back to `Empty` once a script runs dry.
pub struct ScriptedRenderer {
    scripts: Mutex<Vec<(String, Vec<Step>)>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    pub fn new(scripts: Vec<(&str, Vec<Step>)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub async fn calls_for(&self, suffix: &str) -> usize {
        self.calls.lock().await.iter().filter(|u| u.ends_with(suffix)).count()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, url: &str, _ready: &str, timeout: Duration) -> Result<String, RenderError> {
        self.calls.lock().await.push(url.to_string());
        let step = {
            let mut scripts = self.scripts.lock().await;
            scripts
                .iter_mut()
                .find(|(suffix, _)| url.ends_with(suffix.as_str()))
                .and_then(|(_, steps)| (!steps.is_empty()).then(|| steps.remove(0)))
                .unwrap_or(Step::Empty)
        };
        match step {
            Step::Html(html) => Ok(html),
            Step::Empty => Ok(s_empty()),
            Step::Timeout => Err(RenderError::Timeout { url: url.to_string(), after: timeout }),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }
}

fn s_empty() -> String {
    String::from("<div class=\"container\"></div>")
}
