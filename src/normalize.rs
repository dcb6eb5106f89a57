//! Shared post-processing utilities.
//!
//! Engagement-count parsing, URL resolution against a base, order-preserving
//! deduplication, whitespace collapsing, and character-safe truncation. Every
//! strategy funnels its raw findings through these before shaping a record.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9][0-9,]*(?:\.[0-9]+)?)\s*([KkMm])?$").unwrap());

/// Parse a human-formatted engagement count: `"1.2K"` → `1200`, `"3M"` →
/// `3000000`, `"42"` → `42`. Commas are tolerated. Empty or non-numeric
/// input yields `None`. Idempotent on already-numeric input.
pub fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let caps = COUNT_RE.captures(raw)?;
    let digits = caps.get(1)?.as_str().replace(',', "");
    let value: f64 = digits.parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("K") | Some("k") => 1_000.0,
        Some("M") | Some("m") => 1_000_000.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as u64)
}

/// Resolve `href` against `base`, keeping only http(s) results.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// De-duplicate URLs, order-preserving on first occurrence.
///
/// Keys are compared case-insensitively so that query-case variants of the
/// same URL collapse to one entry.
pub fn dedupe_urls(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .unique_by(|u| u.to_ascii_lowercase())
        .collect()
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}
