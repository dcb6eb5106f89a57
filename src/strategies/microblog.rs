//! Lightweight-DOM strategy for microblog posts and profiles.
//!
//! A single GET against the canonical page URL, parsed from the initial HTML
//! payload. The content cascade is an explicit ordered list of named
//! extraction steps evaluated until one yields a non-empty result:
//!
//! 1. the platform's content-test marker element, when present
//! 2. `og:description`, with a leading `"@handle: "` prefix stripped
//! 3. the page `<title>`, with its trailing `"on [Platform]:"` marker stripped
//!
//! Media collection and engagement scanning are independent of the cascade;
//! a post is only a failure when neither text nor media was recovered.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::classify::RESERVED_SEGMENTS;
use crate::error::ExtractError;
use crate::models::{Engagement, ExtractedRecord, PartialRecord};
use crate::normalize::{collapse_whitespace, dedupe_urls, parse_count, resolve_url};
use crate::strategies::{meta_content, page_title};

/// Hosts whose `src` attributes count as post media.
static MEDIA_CDN_HOSTS: &[&str] = &["pbs.twimg.com", "video.twimg.com"];
/// `src` substrings that mark avatar imagery rather than post media.
static MEDIA_EXCLUDES: &[&str] = &["profile", "avatar"];
/// Filename markers of the platform's default icons.
static DEFAULT_ICONS: &[&str] = &["default_profile", "favicon"];

static HANDLE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@([A-Za-z0-9_]{1,15}):\s*").unwrap());
static HANDLE_ANYWHERE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]{1,15})\b").unwrap());
static TITLE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+on\s+(?:X|Twitter):\s*"#).unwrap());
static FOLLOWER_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9][0-9.,]*\s*[KkMm]?\s+[Ff]ollower").unwrap());
static ENGAGEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([0-9][0-9.,]*\s*[KM]?)\s*(likes?|repl(?:y|ies))\b").unwrap()
});

/// One step of the content cascade.
struct CascadeStep {
    name: &'static str,
    run: fn(&Html) -> Option<String>,
}

static CONTENT_CASCADE: &[CascadeStep] = &[
    CascadeStep {
        name: "content_marker",
        run: content_marker,
    },
    CascadeStep {
        name: "og_description",
        run: og_description_content,
    },
    CascadeStep {
        name: "title_marker",
        run: title_content,
    },
];

/// Fetch and parse a single post page.
#[instrument(level = "info", skip(client), fields(url = %source_url))]
pub async fn extract_post(
    client: &reqwest::Client,
    source_url: &str,
    url_handle: Option<&str>,
) -> Result<ExtractedRecord, ExtractError> {
    let html = client
        .get(source_url)
        .header(reqwest::header::ACCEPT, "text/html")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_post(&html, url_handle, source_url)
}

/// Fetch and parse a profile page.
#[instrument(level = "info", skip(client), fields(url = %source_url))]
pub async fn extract_profile(
    client: &reqwest::Client,
    source_url: &str,
    url_handle: &str,
) -> Result<ExtractedRecord, ExtractError> {
    let html = client
        .get(source_url)
        .header(reqwest::header::ACCEPT, "text/html")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_profile(&html, url_handle, source_url)
}

/// Parse a post page's initial HTML into a record.
pub(crate) fn parse_post(
    html: &str,
    url_handle: Option<&str>,
    source_url: &str,
) -> Result<ExtractedRecord, ExtractError> {
    let document = Html::parse_document(html);
    let base = Url::parse(source_url)?;

    let mut body = String::new();
    for step in CONTENT_CASCADE {
        if let Some(text) = (step.run)(&document) {
            debug!(step = step.name, "Content cascade step matched");
            body = text;
            break;
        }
    }

    let author = derive_author(&document, url_handle);
    let media_urls = collect_media(&document, &base);
    let engagement = scan_engagement(&document);

    if body.is_empty() && media_urls.is_empty() {
        return Err(
            ExtractError::no_content("post page exposed no content or media").with_partial(
                PartialRecord {
                    author: author.clone(),
                    ..Default::default()
                },
            ),
        );
    }

    Ok(ExtractedRecord {
        title: String::new(),
        body,
        author,
        media_urls,
        engagement: engagement.filter(|e| !e.is_empty()),
        source_url: source_url.to_string(),
        ..Default::default()
    })
}

/// Parse a profile page: bio instead of content, no engagement.
pub(crate) fn parse_profile(
    html: &str,
    url_handle: &str,
    source_url: &str,
) -> Result<ExtractedRecord, ExtractError> {
    let document = Html::parse_document(html);
    let author = format!("@{url_handle}");

    // A description opening with a bare follower count is the platform's
    // stats line, not the account's bio.
    let bio = meta_content(&document, "og:description")
        .map(|d| collapse_whitespace(&d))
        .filter(|d| !FOLLOWER_COUNT_RE.is_match(d));

    let title = meta_content(&document, "og:title")
        .or_else(|| page_title(&document))
        .unwrap_or_default();

    let Some(bio) = bio else {
        return Err(
            ExtractError::no_content("profile page exposed no bio").with_partial(PartialRecord {
                author: Some(author),
                display_name: if title.is_empty() { None } else { Some(title) },
                ..Default::default()
            }),
        );
    };

    Ok(ExtractedRecord {
        title,
        body: bio,
        author: Some(author),
        source_url: source_url.to_string(),
        ..Default::default()
    })
}

/// Step 1: the platform-specific content-test marker.
fn content_marker(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"[data-testid="tweetText"]"#).ok()?;
    let text = document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))?;
    if text.is_empty() { None } else { Some(text) }
}

/// Step 2: `og:description` with its leading `"@handle: "` prefix stripped.
fn og_description_content(document: &Html) -> Option<String> {
    let raw = meta_content(document, "og:description")?;
    let stripped = HANDLE_PREFIX_RE.replace(&raw, "");
    let text = collapse_whitespace(stripped.trim_matches(['"', '\u{201c}', '\u{201d}']));
    if text.is_empty() { None } else { Some(text) }
}

/// Step 3: page `<title>` minus the trailing `on [Platform]:` marker.
fn title_content(document: &Html) -> Option<String> {
    let title = page_title(document)?;
    let text = match TITLE_MARKER_RE.find(&title) {
        // Keep the quoted post text that follows the marker.
        Some(m) => title[m.end()..].trim_matches(['"', '\u{201c}', '\u{201d}']).to_string(),
        None => title,
    };
    let text = collapse_whitespace(&text);
    if text.is_empty() { None } else { Some(text) }
}

/// Author handle: URL identifier first, then the first profile-link anchor,
/// then an `@handle` pattern inside `og:description`.
fn derive_author(document: &Html, url_handle: Option<&str>) -> Option<String> {
    if let Some(handle) = url_handle {
        return Some(format!("@{handle}"));
    }

    if let Ok(selector) = Selector::parse(r#"a[href^="/"]"#) {
        for el in document.select(&selector) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let segment = href.trim_start_matches('/');
            if !segment.is_empty()
                && !segment.contains('/')
                && segment.len() <= 15
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !RESERVED_SEGMENTS.contains(segment.to_ascii_lowercase().as_str())
            {
                return Some(format!("@{segment}"));
            }
        }
    }

    meta_content(document, "og:description")
        .and_then(|d| HANDLE_ANYWHERE_RE.captures(&d).map(|c| format!("@{}", &c[1])))
}

/// Media URLs from `img`/`video` elements on known CDN hosts, avatars
/// excluded; falls back to `og:image` unless it is a default icon.
fn collect_media(document: &Html, base: &Url) -> Vec<String> {
    let mut found = Vec::new();
    if let Ok(selector) = Selector::parse("img[src], video[src], video source[src]") {
        for el in document.select(&selector) {
            let Some(src) = el.value().attr("src") else {
                continue;
            };
            let lower = src.to_ascii_lowercase();
            if !MEDIA_CDN_HOSTS.iter().any(|host| lower.contains(host)) {
                continue;
            }
            if MEDIA_EXCLUDES.iter().any(|marker| lower.contains(marker)) {
                continue;
            }
            if let Some(absolute) = resolve_url(base, src) {
                found.push(absolute);
            }
        }
    }

    if found.is_empty() {
        if let Some(og_image) = meta_content(document, "og:image") {
            let lower = og_image.to_ascii_lowercase();
            if !DEFAULT_ICONS.iter().any(|icon| lower.contains(icon)) {
                if let Some(absolute) = resolve_url(base, &og_image) {
                    found.push(absolute);
                }
            }
        }
    }

    dedupe_urls(found)
}

/// Locate like/reply counts by scanning text nodes for a numeric prefix
/// followed by a unit word.
fn scan_engagement(document: &Html) -> Option<Engagement> {
    let mut engagement = Engagement::default();
    for text in document.root_element().text() {
        for caps in ENGAGEMENT_RE.captures_iter(text) {
            let count = parse_count(caps[1].trim());
            let unit = caps[2].to_ascii_lowercase();
            if unit.starts_with("like") && engagement.likes.is_none() {
                engagement.likes = count;
            } else if unit.starts_with("repl") && engagement.replies.is_none() {
                engagement.replies = count;
            }
        }
    }
    if engagement.is_empty() {
        None
    } else {
        Some(engagement)
    }
}
