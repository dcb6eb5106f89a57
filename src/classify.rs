//! URL classification into platform, resource kind, and identifiers.
//!
//! Applies an ordered list of regular-expression patterns per platform
//! family. First match wins within a family, and families are tried in a
//! fixed priority order (video before microblog before federated microblog)
//! so that a URL matching multiple loosely-specified patterns resolves
//! deterministically.
//!
//! Returning `None` is not an error: the orchestrator falls back to the
//! generic site extractor for unclassifiable URLs.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::models::{Platform, ResourceIdentity, ResourceKind};

static VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
static VIDEO_SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];

static MICROBLOG_HOSTS: &[&str] = &[
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
    "x.com",
    "www.x.com",
];

static FEDERATED_HOSTS: &[&str] = &[
    "threads.net",
    "www.threads.net",
    "threads.com",
    "www.threads.com",
];

/// Bare path segments that must never be read as profile handles.
pub(crate) static RESERVED_SEGMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "home",
        "explore",
        "notifications",
        "messages",
        "settings",
        "search",
        "compose",
        "login",
        "logout",
        "signup",
        "share",
        "intent",
        "hashtag",
        "about",
        "tos",
        "privacy",
        "i",
        "en",
    ]
    .into_iter()
    .collect()
});

static SHORTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/shorts/([A-Za-z0-9_-]{11})").unwrap());
static EMBED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/embed/([A-Za-z0-9_-]{11})").unwrap());
static BARE_VIDEO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_-]{11})/?$").unwrap());
static CHANNEL_HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/@([A-Za-z0-9_.\-]{3,30})/?$").unwrap());
static CHANNEL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/channel/([A-Za-z0-9_-]+)/?$").unwrap());

static MB_POST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_]{1,15})/status(?:es)?/(\d+)").unwrap());
static MB_PROFILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_]{1,15})/?$").unwrap());

static FED_POST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/@([A-Za-z0-9_.]+)/post/([A-Za-z0-9_-]+)").unwrap());
static FED_PROFILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/@([A-Za-z0-9_.]+)/?$").unwrap());

/// Classify a URL into a [`ResourceIdentity`].
///
/// A `hint` restricts matching to a single platform family; without one the
/// families are tried in priority order. Returns `None` when no pattern
/// matches, deferring the URL to the generic path.
pub fn classify(url: &Url, hint: Option<Platform>) -> Option<ResourceIdentity> {
    let host = url.host_str()?.to_ascii_lowercase();

    let identity = match hint {
        Some(Platform::Video) => classify_video(url, &host),
        Some(Platform::Microblog) => classify_microblog(url, &host),
        Some(Platform::FederatedMicroblog) => classify_federated(url, &host),
        Some(Platform::Generic) => None,
        None => classify_video(url, &host)
            .or_else(|| classify_microblog(url, &host))
            .or_else(|| classify_federated(url, &host)),
    };

    if let Some(ref id) = identity {
        debug!(
            platform = %id.platform,
            kind = ?id.kind,
            identifiers = ?id.identifiers,
            "Classified URL"
        );
    }
    identity
}

fn classify_video(url: &Url, host: &str) -> Option<ResourceIdentity> {
    let path = url.path();

    if VIDEO_SHORT_HOSTS.contains(&host) {
        // Short-link hosts carry a bare 11-character video id as the path.
        let caps = BARE_VIDEO_RE.captures(path)?;
        return Some(identity(Platform::Video, ResourceKind::Video, &caps, 1));
    }
    if !VIDEO_HOSTS.contains(&host) {
        return None;
    }

    if path == "/watch" {
        let id = url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())?;
        if id.len() == 11 {
            return Some(ResourceIdentity::new(
                Platform::Video,
                ResourceKind::Video,
                vec![id],
            ));
        }
        return None;
    }
    if let Some(caps) = SHORTS_RE.captures(path) {
        return Some(identity(Platform::Video, ResourceKind::Shorts, &caps, 1));
    }
    if let Some(caps) = EMBED_RE.captures(path) {
        return Some(identity(Platform::Video, ResourceKind::Video, &caps, 1));
    }
    if let Some(caps) = CHANNEL_HANDLE_RE.captures(path) {
        return Some(identity(Platform::Video, ResourceKind::Channel, &caps, 1));
    }
    if let Some(caps) = CHANNEL_ID_RE.captures(path) {
        return Some(identity(Platform::Video, ResourceKind::Channel, &caps, 1));
    }
    None
}

fn classify_microblog(url: &Url, host: &str) -> Option<ResourceIdentity> {
    if !MICROBLOG_HOSTS.contains(&host) {
        return None;
    }
    let path = url.path();

    if let Some(caps) = MB_POST_RE.captures(path) {
        return Some(identity(Platform::Microblog, ResourceKind::Post, &caps, 2));
    }
    if let Some(caps) = MB_PROFILE_RE.captures(path) {
        let handle = caps.get(1).unwrap().as_str();
        if RESERVED_SEGMENTS.contains(handle.to_ascii_lowercase().as_str()) {
            return None;
        }
        return Some(identity(Platform::Microblog, ResourceKind::Profile, &caps, 1));
    }
    None
}

fn classify_federated(url: &Url, host: &str) -> Option<ResourceIdentity> {
    if !FEDERATED_HOSTS.contains(&host) {
        return None;
    }
    let path = url.path();

    if let Some(caps) = FED_POST_RE.captures(path) {
        return Some(identity(
            Platform::FederatedMicroblog,
            ResourceKind::Post,
            &caps,
            2,
        ));
    }
    if let Some(caps) = FED_PROFILE_RE.captures(path) {
        return Some(identity(
            Platform::FederatedMicroblog,
            ResourceKind::Profile,
            &caps,
            1,
        ));
    }
    None
}

fn identity(
    platform: Platform,
    kind: ResourceKind,
    caps: &regex::Captures<'_>,
    groups: usize,
) -> ResourceIdentity {
    let identifiers = (1..=groups)
        .filter_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
        .collect();
    ResourceIdentity::new(platform, kind, identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_str(url: &str) -> Option<ResourceIdentity> {
        classify(&Url::parse(url).unwrap(), None)
    }

    #[test]
    fn test_watch_url() {
        let id = classify_str("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id.platform, Platform::Video);
        assert_eq!(id.kind, ResourceKind::Video);
        assert_eq!(id.identifiers, vec!["dQw4w9WgXcQ"]);
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        let id =
            classify_str("https://www.youtube.com/watch?t=10&v=dQw4w9WgXcQ&list=x").unwrap();
        assert_eq!(id.identifiers, vec!["dQw4w9WgXcQ"]);
    }

    #[test]
    fn test_shorts_url() {
        let id = classify_str("https://youtube.com/shorts/AbCdEfGhIjK").unwrap();
        assert_eq!(id.kind, ResourceKind::Shorts);
        assert_eq!(id.identifiers, vec!["AbCdEfGhIjK"]);
    }

    #[test]
    fn test_embed_and_short_link() {
        let embed = classify_str("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap();
        assert_eq!(embed.kind, ResourceKind::Video);

        let short = classify_str("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(short.kind, ResourceKind::Video);
        assert_eq!(short.identifiers, vec!["dQw4w9WgXcQ"]);
    }

    #[test]
    fn test_channel_urls() {
        let handle = classify_str("https://www.youtube.com/@SomeCreator").unwrap();
        assert_eq!(handle.kind, ResourceKind::Channel);
        assert_eq!(handle.identifiers, vec!["SomeCreator"]);

        let by_id = classify_str("https://www.youtube.com/channel/UCabc123DEF").unwrap();
        assert_eq!(by_id.kind, ResourceKind::Channel);
    }

    #[test]
    fn test_microblog_post() {
        let id = classify_str("https://x.com/alice/status/1234567890").unwrap();
        assert_eq!(id.platform, Platform::Microblog);
        assert_eq!(id.kind, ResourceKind::Post);
        assert_eq!(id.identifiers, vec!["alice", "1234567890"]);
    }

    #[test]
    fn test_microblog_profile() {
        let id = classify_str("https://twitter.com/alice").unwrap();
        assert_eq!(id.kind, ResourceKind::Profile);
        assert_eq!(id.identifiers, vec!["alice"]);
    }

    #[test]
    fn test_reserved_segment_is_not_a_handle() {
        assert!(classify_str("https://x.com/settings").is_none());
        assert!(classify_str("https://x.com/home").is_none());
        assert!(classify_str("https://twitter.com/Search").is_none());
    }

    #[test]
    fn test_federated_post_and_profile() {
        let post = classify_str("https://www.threads.net/@alice.example/post/Cz2abc").unwrap();
        assert_eq!(post.platform, Platform::FederatedMicroblog);
        assert_eq!(post.kind, ResourceKind::Post);
        assert_eq!(post.identifiers, vec!["alice.example", "Cz2abc"]);

        let profile = classify_str("https://threads.net/@alice.example").unwrap();
        assert_eq!(profile.kind, ResourceKind::Profile);
    }

    #[test]
    fn test_unknown_host_falls_through() {
        assert!(classify_str("https://example.com/blog/post-1").is_none());
    }

    #[test]
    fn test_hint_restricts_family() {
        let url = Url::parse("https://x.com/alice").unwrap();
        assert!(classify(&url, Some(Platform::Video)).is_none());
        assert!(classify(&url, Some(Platform::Microblog)).is_some());
        assert!(classify(&url, Some(Platform::Generic)).is_none());
    }

    #[test]
    fn test_watch_with_malformed_id() {
        assert!(classify_str("https://www.youtube.com/watch?v=short").is_none());
    }
}
