//! Configurable selector-cascade extraction for arbitrary blog/news sites.
//!
//! The only strategy that returns a list: it targets article-listing pages.
//! Selector configuration resolves caller-supplied config first, then a small
//! built-in table of per-domain configs, then a broad generic fallback. When
//! the container pass yields nothing at all, a link-heuristic pass over every
//! anchor on the page salvages likely article links.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::ExtractError;
use crate::models::ExtractedRecord;
use crate::normalize::{collapse_whitespace, resolve_url, truncate_chars};

/// Result cap for one listing extraction.
pub const MAX_LISTING_RESULTS: usize = 20;
/// Containers with titles shorter than this are skipped.
const MIN_TITLE_CHARS: usize = 5;
/// Description cap.
const MAX_DESCRIPTION_CHARS: usize = 300;
/// Anchor-fallback text length bounds.
const ANCHOR_TEXT_CHARS: (usize, usize) = (10, 200);

/// Path keywords that mark an anchor as likely article content.
static CONTENT_KEYWORDS: &[&str] = &["blog", "news", "post", "article", "announcement"];

/// CSS selectors describing how to pull listing entries out of a page.
///
/// Selector lists are cascades: each list is tried in order and the first
/// selector that matches anything wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Elements believed to wrap one listing entry.
    pub container: Vec<String>,
    /// Title candidates inside a container.
    pub title: Vec<String>,
    /// Link anchors inside a container.
    pub link: Vec<String>,
    /// Optional description candidates.
    #[serde(default)]
    pub description: Vec<String>,
    /// Optional publish-date candidates.
    #[serde(default)]
    pub date: Vec<String>,
}

impl SelectorConfig {
    /// Broad fallback selectors for unknown sites.
    pub fn generic() -> Self {
        Self {
            container: vec![
                "article".into(),
                ".post".into(),
                ".blog-post".into(),
                ".news-item".into(),
                ".card".into(),
                ".entry".into(),
                "li.post-item".into(),
            ],
            title: vec![
                "h1".into(),
                "h2".into(),
                "h3".into(),
                ".title".into(),
                ".headline".into(),
                ".post-title".into(),
            ],
            link: vec!["a[href]".into()],
            description: vec![
                "p".into(),
                ".summary".into(),
                ".excerpt".into(),
                ".description".into(),
            ],
            date: vec!["time".into(), ".date".into(), ".published".into()],
        }
    }

    /// Load a config from a YAML or JSON document.
    pub fn from_str(raw: &str) -> Result<Self, ExtractError> {
        serde_yaml::from_str(raw).map_err(|e| {
            ExtractError::new(
                crate::error::ErrorKind::InvalidUrl,
                format!("bad selector config: {e}"),
            )
        })
    }
}

/// Built-in per-domain configs for known sites.
static KNOWN_SITES: Lazy<HashMap<&'static str, SelectorConfig>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "news.ycombinator.com",
        SelectorConfig {
            container: vec!["tr.athing".into()],
            title: vec![".titleline a".into()],
            link: vec![".titleline a".into()],
            description: vec![],
            date: vec![],
        },
    );
    table.insert(
        "techcrunch.com",
        SelectorConfig {
            container: vec!["div.post-block".into(), "article".into()],
            title: vec!["h2 a".into(), "h2".into(), "h3".into()],
            link: vec!["h2 a".into(), "a[href]".into()],
            description: vec![".post-block__content".into(), "p".into()],
            date: vec!["time".into()],
        },
    );
    table.insert(
        "www.theverge.com",
        SelectorConfig {
            container: vec!["article".into(), ".duet--content-cards--content-card".into()],
            title: vec!["h2".into(), "h3".into(), ".font-polysans".into()],
            link: vec!["a[href]".into()],
            description: vec!["p".into()],
            date: vec!["time".into()],
        },
    );
    table
});

/// Resolve the selector config for a page: caller override, then the
/// known-site table, then the generic fallback.
pub fn resolve_config(host: &str, caller: Option<&SelectorConfig>) -> SelectorConfig {
    if let Some(config) = caller {
        return config.clone();
    }
    let host = host.to_ascii_lowercase();
    KNOWN_SITES
        .get(host.as_str())
        .or_else(|| KNOWN_SITES.get(host.trim_start_matches("www.")))
        .cloned()
        .unwrap_or_else(SelectorConfig::generic)
}

/// Fetch a listing page and extract its entries.
#[instrument(level = "info", skip(client, config), fields(url = %page_url))]
pub async fn extract_listing(
    client: &reqwest::Client,
    page_url: &str,
    config: Option<&SelectorConfig>,
) -> Result<Vec<ExtractedRecord>, ExtractError> {
    let base = Url::parse(page_url)?;
    let html = client
        .get(page_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let resolved = resolve_config(base.host_str().unwrap_or_default(), config);
    let records = extract_from_html(&html, &base, &resolved);
    info!(count = records.len(), "Extracted listing entries");
    Ok(records)
}

/// Pure extraction over already-fetched HTML.
pub fn extract_from_html(
    html: &str,
    base: &Url,
    config: &SelectorConfig,
) -> Vec<ExtractedRecord> {
    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = container_pass(&document, base, config, &mut seen);

    if records.is_empty() {
        debug!("Container pass empty; falling back to anchor heuristic");
        records = anchor_pass(&document, base, &mut seen);
    }
    records.truncate(MAX_LISTING_RESULTS);
    records
}

fn container_pass(
    document: &Html,
    base: &Url,
    config: &SelectorConfig,
    seen: &mut HashSet<String>,
) -> Vec<ExtractedRecord> {
    let mut records = Vec::new();
    let Some(containers) = first_matching_selector(document, &config.container) else {
        return records;
    };

    for container in containers {
        if records.len() >= MAX_LISTING_RESULTS {
            break;
        }

        let Some(href) = select_in(&container, &config.link)
            .and_then(|el| el.value().attr("href").map(str::to_string))
        else {
            continue;
        };
        if is_non_article(&href) {
            continue;
        }
        let Some(link) = resolve_url(base, &href) else {
            continue;
        };
        if !seen.insert(link.to_ascii_lowercase()) {
            continue;
        }

        let Some(title) = select_in(&container, &config.title)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| t.chars().count() >= MIN_TITLE_CHARS)
        else {
            continue;
        };

        let description = select_in(&container, &config.description)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|d| !d.is_empty())
            .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS));

        let published_at = select_in(&container, &config.date).and_then(extract_date);

        records.push(ExtractedRecord {
            title,
            body: description.unwrap_or_default(),
            published_at,
            source_url: link,
            ..Default::default()
        });
    }
    records
}

/// Link-heuristic fallback: keep anchors whose path names content and whose
/// text is plausibly a headline.
fn anchor_pass(document: &Html, base: &Url, seen: &mut HashSet<String>) -> Vec<ExtractedRecord> {
    let mut records = Vec::new();
    let Ok(selector) = Selector::parse("a[href]") else {
        return records;
    };

    for anchor in document.select(&selector) {
        if records.len() >= MAX_LISTING_RESULTS {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if is_non_article(href) {
            continue;
        }
        let Some(link) = resolve_url(base, href) else {
            continue;
        };

        let path = Url::parse(&link)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_default();
        if !CONTENT_KEYWORDS.iter().any(|kw| path.contains(kw)) {
            continue;
        }

        let text = collapse_whitespace(&anchor.text().collect::<Vec<_>>().join(" "));
        let len = text.chars().count();
        if len < ANCHOR_TEXT_CHARS.0 || len > ANCHOR_TEXT_CHARS.1 {
            continue;
        }
        if !seen.insert(link.to_ascii_lowercase()) {
            continue;
        }

        records.push(ExtractedRecord {
            title: text,
            source_url: link,
            ..Default::default()
        });
    }
    records
}

/// First selector in the cascade that matches anything.
fn first_matching_selector<'a>(
    document: &'a Html,
    selectors: &[String],
) -> Option<Vec<ElementRef<'a>>> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let matched: Vec<_> = document.select(&selector).collect();
        if !matched.is_empty() {
            return Some(matched);
        }
    }
    None
}

/// First cascade match inside a container.
fn select_in<'a>(container: &ElementRef<'a>, selectors: &[String]) -> Option<ElementRef<'a>> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(el) = container.select(&selector).next() {
            return Some(el);
        }
    }
    None
}

/// Obvious non-articles: fragment-only links, documents, mail links.
fn is_non_article(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("javascript:")
        || lower.split('?').next().is_some_and(|p| p.ends_with(".pdf"))
}

/// Publish date from a `datetime` attribute or the element's visible text,
/// normalized to ISO-8601 where parseable.
fn extract_date(el: ElementRef<'_>) -> Option<String> {
    let candidate = el
        .value()
        .attr("datetime")
        .map(str::to_string)
        .unwrap_or_else(|| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")));
    normalize_date(&candidate)
}

fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339());
    }
    for format in ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/").unwrap()
    }

    const LISTING_HTML: &str = r##"<html><body>
        <article>
            <h2>First Article Headline</h2>
            <p>A summary of the first article that should be kept.</p>
            <time datetime="2026-03-01T12:00:00Z">March 1</time>
            <a href="/blog/first-article">Read more</a>
        </article>
        <article>
            <h2>Tiny</h2>
            <a href="/blog/too-short">Read more</a>
        </article>
        <article>
            <h2>Duplicate Of The First</h2>
            <a href="/blog/FIRST-ARTICLE">Read more</a>
        </article>
        <article>
            <h2>Document Link Entry</h2>
            <a href="/files/report.pdf">Download</a>
        </article>
        <article>
            <h2>Second Article Headline</h2>
            <a href="#comments">comments</a>
        </article>
    </body></html>"##;

    #[test]
    fn test_container_pass() {
        let records = extract_from_html(LISTING_HTML, &base(), &SelectorConfig::generic());
        // Short title, pdf, fragment-only, and the case-variant duplicate of
        // the first link are all dropped.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "First Article Headline");
        assert_eq!(records[0].source_url, "https://example.com/blog/first-article");
        assert!(records[0].body.starts_with("A summary"));
        assert_eq!(
            records[0].published_at.as_deref(),
            Some("2026-03-01T12:00:00+00:00")
        );
    }

    #[test]
    fn test_anchor_fallback_when_no_containers() {
        let html = r#"<html><body>
            <div><a href="/news/big-story">A headline long enough to keep</a></div>
            <div><a href="/news/other">short</a></div>
            <div><a href="/about">About us page link text here</a></div>
            <div><a href="/blog/second-story">Another plausible headline text</a></div>
        </body></html>"#;
        let records = extract_from_html(html, &base(), &SelectorConfig::generic());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "A headline long enough to keep");
        assert_eq!(records[0].source_url, "https://example.com/news/big-story");
        for r in &records {
            let len = r.title.chars().count();
            assert!((10..=200).contains(&len));
        }
    }

    #[test]
    fn test_result_cap() {
        let mut html = String::from("<html><body>");
        for i in 0..30 {
            html.push_str(&format!(
                "<article><h2>Article Number {i} Headline</h2>\
                 <a href=\"/blog/post-{i}\">link</a></article>"
            ));
        }
        html.push_str("</body></html>");
        let records = extract_from_html(&html, &base(), &SelectorConfig::generic());
        assert_eq!(records.len(), MAX_LISTING_RESULTS);
    }

    #[test]
    fn test_config_resolution_order() {
        let caller = SelectorConfig {
            container: vec![".custom".into()],
            title: vec!["h1".into()],
            link: vec!["a".into()],
            description: vec![],
            date: vec![],
        };
        let resolved = resolve_config("news.ycombinator.com", Some(&caller));
        assert_eq!(resolved.container, vec![".custom".to_string()]);

        let known = resolve_config("news.ycombinator.com", None);
        assert_eq!(known.container, vec!["tr.athing".to_string()]);

        let fallback = resolve_config("unknown.example", None);
        assert!(fallback.container.contains(&"article".to_string()));
    }

    #[test]
    fn test_selector_config_from_yaml() {
        let raw = r#"
container: [".story"]
title: ["h2"]
link: ["a[href]"]
"#;
        let config = SelectorConfig::from_str(raw).unwrap();
        assert_eq!(config.container, vec![".story".to_string()]);
        assert!(config.date.is_empty());
    }

    #[test]
    fn test_is_non_article() {
        assert!(is_non_article("#top"));
        assert!(is_non_article("mailto:a@b.c"));
        assert!(is_non_article("/files/x.pdf"));
        assert!(is_non_article("/files/x.PDF?dl=1"));
        assert!(!is_non_article("/blog/post"));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(
            normalize_date("2026-03-01T12:00:00Z").as_deref(),
            Some("2026-03-01T12:00:00+00:00")
        );
        assert_eq!(normalize_date("2026-03-01").as_deref(), Some("2026-03-01"));
        assert_eq!(normalize_date("March 1, 2026").as_deref(), Some("2026-03-01"));
        assert_eq!(normalize_date("yesterday"), None);
    }
}
