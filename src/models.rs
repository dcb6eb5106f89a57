//! Data models for extraction requests, classified resources, and results.
//!
//! This module defines the core data structures used throughout the engine:
//! - [`ResourceIdentity`]: What a URL points at (platform, kind, identifiers)
//! - [`ExtractedRecord`]: The normalized output of a successful extraction
//! - [`PartialRecord`]: Best-effort fields recovered on a failed extraction
//! - [`ExtractionOutcome`]: The tagged success/failure result handed to callers
//!
//! All types are transient: they are constructed and discarded within a single
//! extraction call. The engine never persists them; durable storage of an
//! [`ExtractedRecord`] is the caller's responsibility.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, ExtractError};

/// The platform family a URL was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Video platform (watch pages, shorts, channels).
    Video,
    /// Microblog (posts and profiles served as static HTML).
    Microblog,
    /// Federated microblog whose content only exists after client rendering.
    FederatedMicroblog,
    /// Anything else; handled by the generic site extractor.
    Generic,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Video => "video",
            Platform::Microblog => "microblog",
            Platform::FederatedMicroblog => "federated_microblog",
            Platform::Generic => "generic",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Platform {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(Platform::Video),
            "microblog" => Ok(Platform::Microblog),
            "federated" | "federated_microblog" | "federated-microblog" => {
                Ok(Platform::FederatedMicroblog)
            }
            "generic" => Ok(Platform::Generic),
            other => Err(ExtractError::new(
                ErrorKind::InvalidUrl,
                format!("unknown platform hint: {other}"),
            )),
        }
    }
}

/// The kind of resource a classified URL identifies.
///
/// Which kinds are possible depends on the platform: video platforms yield
/// `Video`/`Shorts`/`Channel`, microblogs yield `Post`/`Profile`, and the
/// generic path always yields `Listing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Video,
    Shorts,
    Channel,
    Post,
    Profile,
    Listing,
}

/// Output of URL classification.
///
/// Every successfully classified URL yields exactly one `ResourceIdentity`.
/// An unclassifiable URL yields none; the orchestrator then defers to the
/// generic site extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub platform: Platform,
    pub kind: ResourceKind,
    /// Ordered path segments captured from the URL pattern
    /// (e.g. a username, a post id, a video id).
    pub identifiers: Vec<String>,
}

impl ResourceIdentity {
    pub fn new(platform: Platform, kind: ResourceKind, identifiers: Vec<String>) -> Self {
        Self {
            platform,
            kind,
            identifiers,
        }
    }

    /// The first captured identifier, if any.
    pub fn primary_id(&self) -> Option<&str> {
        self.identifiers.first().map(String::as_str)
    }
}

/// Like/reply counts associated with a social post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: Option<u64>,
    pub replies: Option<u64>,
}

impl Engagement {
    pub fn is_empty(&self) -> bool {
        self.likes.is_none() && self.replies.is_none()
    }
}

/// One entry of a profile-feed automation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    /// Absolute permalink of the post.
    pub permalink: String,
    /// The post's textual content (may be empty for media-only posts).
    #[serde(default)]
    pub content: String,
    /// Media URLs attached to the post.
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Post timestamp as found on the page, ISO-8601 where available.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub engagement: Option<Engagement>,
}

/// The normalized output of a successful extraction.
///
/// # Invariant
///
/// On a success result, `body` and `media_urls` are never both empty; the
/// orchestrator treats emptiness of both as a [`NoContentFound`] failure.
///
/// [`NoContentFound`]: crate::error::ErrorKind::NoContentFound
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    /// Title or headline; may be empty.
    #[serde(default)]
    pub title: String,
    /// Primary textual content.
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// ISO-8601 publish timestamp, when recoverable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Ordered, de-duplicated list of absolute media URLs.
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<Engagement>,
    /// The original input URL this record was extracted from.
    pub source_url: String,
    /// Per-post records from a profile-feed run; empty for single resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<FeedPost>,
}

impl ExtractedRecord {
    /// True when neither textual content nor media was recovered.
    pub fn is_hollow(&self) -> bool {
        self.body.trim().is_empty() && self.media_urls.is_empty() && self.posts.is_empty()
    }

    /// Derive the best-effort partial view of this record, used when a
    /// later step fails and the caller should still see what was recovered.
    pub fn to_partial(&self) -> PartialRecord {
        PartialRecord {
            author: self.author.clone(),
            display_name: if self.title.is_empty() {
                None
            } else {
                Some(self.title.clone())
            },
            bio: None,
            avatar_url: None,
        }
    }
}

/// Best-effort fields recoverable even when the primary content could not be.
///
/// Attached to failures so callers can present a degraded result (e.g. a
/// known display name and bio for a private profile) rather than a bare error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl PartialRecord {
    pub fn is_empty(&self) -> bool {
        self.author.is_none()
            && self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
    }
}

/// Tagged result of a single-resource extraction call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success {
        record: ExtractedRecord,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        partial: Option<PartialRecord>,
    },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }
}

impl From<ExtractedRecord> for ExtractionOutcome {
    fn from(record: ExtractedRecord) -> Self {
        ExtractionOutcome::Success { record }
    }
}

impl From<ExtractError> for ExtractionOutcome {
    fn from(e: ExtractError) -> Self {
        ExtractionOutcome::Failure {
            kind: e.kind,
            message: e.message,
            partial: e.partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_hint_parsing() {
        assert_eq!("video".parse::<Platform>().unwrap(), Platform::Video);
        assert_eq!(
            "federated-microblog".parse::<Platform>().unwrap(),
            Platform::FederatedMicroblog
        );
        assert!("telegraph".parse::<Platform>().is_err());
    }

    #[test]
    fn test_record_hollowness() {
        let mut record = ExtractedRecord {
            source_url: "https://example.com".to_string(),
            ..Default::default()
        };
        assert!(record.is_hollow());

        record.media_urls.push("https://example.com/a.jpg".to_string());
        assert!(!record.is_hollow());

        record.media_urls.clear();
        record.body = "hello".to_string();
        assert!(!record.is_hollow());
    }

    #[test]
    fn test_outcome_serialization_uses_status_tag() {
        let outcome: ExtractionOutcome = ExtractedRecord {
            title: "T".to_string(),
            body: "B".to_string(),
            source_url: "https://example.com".to_string(),
            ..Default::default()
        }
        .into();

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""status":"success""#));
        assert!(json.contains(r#""sourceUrl":"https://example.com""#));
    }

    #[test]
    fn test_failure_carries_partial() {
        let e = ExtractError::new(ErrorKind::NoContentFound, "no posts").with_partial(
            PartialRecord {
                display_name: Some("Alice".to_string()),
                ..Default::default()
            },
        );
        let outcome = ExtractionOutcome::from(e);
        match outcome {
            ExtractionOutcome::Failure { kind, partial, .. } => {
                assert_eq!(kind, ErrorKind::NoContentFound);
                assert_eq!(partial.unwrap().display_name.as_deref(), Some("Alice"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_record_to_partial() {
        let record = ExtractedRecord {
            title: "Alice".to_string(),
            author: Some("@alice".to_string()),
            source_url: "https://example.com".to_string(),
            ..Default::default()
        };
        let partial = record.to_partial();
        assert_eq!(partial.author.as_deref(), Some("@alice"));
        assert_eq!(partial.display_name.as_deref(), Some("Alice"));
    }
}
