// src/core/html.rs
// Small helpers over `scraper`. An invalid selector matches nothing, so
// callers see a structural miss rather than a panic.

use scraper::{ElementRef, Html, Selector};

use super::sanitize::normalize_ws;

pub fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn select_in<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => el.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn first<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    el.select(&sel).next()
}

/// Whitespace-normalized text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

/// Text of the first match under `el`, `None` when missing or blank.
pub fn first_text(el: ElementRef<'_>, css: &str) -> Option<String> {
    first(el, css).map(text_of).filter(|t| !t.is_empty())
}

pub fn first_attr(el: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    first(el, css)?.value().attr(attr).map(str::to_string)
}

/// Does the listing have a "next" pager link?
pub fn has_next_link(doc: &Html) -> bool {
    !select_all(doc, "li.next a").is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_read_text_and_attrs() {
        let doc = Html::parse_document(
            r#"<div class="c"><a href="/x" title="T">  a
                b </a><span></span></div><ul class="pager"><li class="next"><a href="/2">next</a></li></ul>"#,
        );
        let c = select_all(&doc, "div.c")[0];
        assert_eq!(first_text(c, "a").as_deref(), Some("a b"));
        assert_eq!(first_attr(c, "a", "title").as_deref(), Some("T"));
        assert_eq!(first_text(c, "span"), None);
        assert!(has_next_link(&doc));
        assert!(select_all(&doc, "[[bad").is_empty());
    }

    #[test]
    fn no_pager_means_last_page() {
        let doc = Html::parse_document("<ul class=\"pager\"><li class=\"previous\"><a>prev</a></li></ul>");
        assert!(!has_next_link(&doc));
    }
}
