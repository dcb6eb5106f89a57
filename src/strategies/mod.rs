//! Per-platform extraction strategies.
//!
//! Each strategy is a fallback chain: an ordered list of extraction attempts
//! evaluated until one yields a non-empty result, instead of a single
//! brittle selector.
//!
//! # Strategies
//!
//! | Platform | Module | Method | Notes |
//! |----------|--------|--------|-------|
//! | Video | [`video`] | oEmbed + page scrape | Subtitle transcript when the external tool is present |
//! | Microblog | [`microblog`] | Single GET + structured metadata | Posts and profiles |
//! | Federated microblog | [`automation`] | Remote headless browser | Content exists only after hydration |
//! | Everything else | [`generic`] | Selector cascade | Listing pages; the only strategy returning a list |
//!
//! # Common Patterns
//!
//! Strategies fetch first, then parse synchronously through pure functions
//! that take the raw HTML (or the marshalled in-page result) and return owned
//! data. This keeps parsers unit-testable on fixture strings and keeps
//! `scraper::Html` out of any `await` span.
//!
//! Soft fallbacks are absorbed here: a failed description fetch or a missing
//! subtitle tool reduces the record instead of failing the call. Only the
//! primary content source erroring propagates as a failure.

pub mod automation;
pub mod generic;
pub mod microblog;
pub mod video;

use scraper::{Html, Selector};

/// Content of a `<meta>` tag matched by `property` or `name`.
pub(crate) fn meta_content(document: &Html, key: &str) -> Option<String> {
    let selector = Selector::parse(&format!(
        r#"meta[property="{key}"], meta[name="{key}"]"#
    ))
    .ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Text of the page `<title>` element.
pub(crate) fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}
