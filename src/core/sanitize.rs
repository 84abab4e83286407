// src/core/sanitize.rs

/// Collapse runs of whitespace to one space and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Parse a listed price such as `£51.77`. Currency symbols, mis-decoded
/// prefixes (`Â£`) and thousands separators are ignored.
pub fn parse_price(s: &str) -> Option<f64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Star count from a `star-rating <Word>` class list.
pub fn rating_from_class(class: &str) -> Option<i64> {
    class.split_whitespace().find_map(|word| match word.to_ascii_lowercase().as_str() {
        "zero" => Some(0),
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        _ => None,
    })
}

/// Strip the typographic quotes the quotes site wraps every text in.
pub fn strip_quote_marks(s: &str) -> String {
    let t = normalize_ws(s);
    t.trim_matches(|c| matches!(c, '“' | '”' | '"')).trim().to_string()
}

/// Last meaningful path segment of a detail URL:
/// `.../catalogue/a-light-in-the-attic_1000/index.html` -> `a-light-in-the-attic_1000`.
pub fn slug_from_path(path: &str) -> Option<String> {
    path.split('/')
        .filter(|seg| !seg.is_empty() && *seg != "index.html")
        .next_back()
        .map(|seg| seg.trim_end_matches(".html").to_string())
        .filter(|seg| !seg.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_is_collapsed() {
        assert_eq!(normalize_ws("  In stock\n   (22 available) "), "In stock (22 available)");
        assert_eq!(normalize_ws("\n\t"), "");
    }

    #[test]
    fn prices() {
        assert_eq!(parse_price("£51.77"), Some(51.77));
        assert_eq!(parse_price("Â£13.99"), Some(13.99));
        assert_eq!(parse_price("£1,299.00"), Some(1299.0));
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn ratings() {
        assert_eq!(rating_from_class("star-rating Three"), Some(3));
        assert_eq!(rating_from_class("star-rating five"), Some(5));
        assert_eq!(rating_from_class("star-rating"), None);
    }

    #[test]
    fn quote_marks() {
        assert_eq!(strip_quote_marks("“A day without sunshine is like, you know, night.”"),
                   "A day without sunshine is like, you know, night.");
        assert_eq!(strip_quote_marks("plain"), "plain");
    }

    #[test]
    fn slugs() {
        assert_eq!(
            slug_from_path("/catalogue/a-light-in-the-attic_1000/index.html").as_deref(),
            Some("a-light-in-the-attic_1000")
        );
        assert_eq!(slug_from_path("/catalogue/tipping-the-velvet_999.html").as_deref(), Some("tipping-the-velvet_999"));
        assert_eq!(slug_from_path("/"), None);
    }
}
