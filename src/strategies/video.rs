//! Video platform strategy: oEmbed metadata, page description, subtitles.
//!
//! The public oEmbed endpoint is the primary source: it carries no session
//! and is expected to succeed even when full-page scraping is blocked. The
//! watch page itself is only consulted best-effort for a description, and a
//! subtitle transcript (when the external tool is present) overrides both.
//!
//! Channels get a lighter treatment: `og:title` and description meta tags
//! only, no listing of videos.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorKind, ExtractError};
use crate::models::{ExtractedRecord, PartialRecord, ResourceIdentity, ResourceKind};
use crate::normalize::{collapse_whitespace, dedupe_urls};
use crate::resilience::{with_timeout, PLATFORM_FETCH_TIMEOUT, SUBTITLE_TIMEOUT};
use crate::strategies::{meta_content, page_title};
use crate::subtitles::{self, SubtitleConfig};

/// Response shape of the platform's public embed-metadata endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct OEmbed {
    pub title: String,
    pub author_name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

static SHORT_DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""shortDescription":"((?:[^"\\]|\\.)*)""#).unwrap());

/// Extract a video or shorts resource.
#[instrument(level = "info", skip_all, fields(url = %source_url))]
pub async fn extract_video(
    client: &reqwest::Client,
    identity: &ResourceIdentity,
    source_url: &str,
    subtitle_config: Option<&SubtitleConfig>,
) -> Result<ExtractedRecord, ExtractError> {
    let video_id = identity
        .primary_id()
        .ok_or_else(|| ExtractError::new(ErrorKind::InvalidUrl, "missing video id"))?;
    let watch_url = watch_url_for(identity.kind, video_id);

    // Primary source. A failure here fails the whole call. The network
    // budget applies per step; the slower subtitle step has its own below.
    let oembed = with_timeout(
        PLATFORM_FETCH_TIMEOUT,
        "embed metadata fetch",
        fetch_oembed(client, &watch_url),
    )
    .await?;
    info!(title = %oembed.title, author = %oembed.author_name, "Fetched embed metadata");

    // Best-effort page description; absorbed on failure.
    let description = match with_timeout(PLATFORM_FETCH_TIMEOUT, "watch page fetch", async {
        let response = client.get(&watch_url).send().await?;
        Ok(response.text().await?)
    })
    .await
    {
        Ok(html) => page_description(&html),
        Err(e) => {
            warn!(error = %e, "Watch page fetch failed; using embed metadata only");
            None
        }
    };

    // Transcript beats description beats the synthesized fallback.
    let transcript = match subtitle_config {
        Some(config) => transcript_soft(config, &watch_url, video_id, SUBTITLE_TIMEOUT).await,
        None => None,
    };

    Ok(shape_record(
        oembed,
        description,
        transcript,
        identity.kind,
        source_url,
    ))
}

/// Assemble the final record with the body preference order applied:
/// transcript, then page description, then the `"{Video|Shorts} by {author}"`
/// synthesis.
fn shape_record(
    oembed: OEmbed,
    description: Option<String>,
    transcript: Option<String>,
    kind: ResourceKind,
    source_url: &str,
) -> ExtractedRecord {
    let kind_label = match kind {
        ResourceKind::Shorts => "Shorts",
        _ => "Video",
    };
    let body = transcript
        .or(description)
        .unwrap_or_else(|| format!("{kind_label} by {}", oembed.author_name));

    ExtractedRecord {
        title: oembed.title,
        body,
        author: Some(oembed.author_name),
        media_urls: dedupe_urls(oembed.thumbnail_url.into_iter().collect()),
        source_url: source_url.to_string(),
        ..Default::default()
    }
}

/// Transcript retrieval as a soft step: every failure mode, including a
/// tool absent or exceeding its own budget, degrades to `None` instead of
/// failing the call.
async fn transcript_soft(
    config: &SubtitleConfig,
    watch_url: &str,
    video_id: &str,
    budget: Duration,
) -> Option<String> {
    match with_timeout(
        budget,
        "subtitle retrieval",
        subtitles::fetch_transcript(config, watch_url, video_id),
    )
    .await
    {
        Ok(transcript) => transcript,
        Err(e) if e.kind == ErrorKind::ToolUnavailable => {
            warn!(message = %e.message, "Subtitle tool unavailable; degrading to metadata");
            None
        }
        Err(e) => {
            warn!(error = %e, "Subtitle retrieval failed");
            // A timeout drops the retrieval mid-flight, before its own
            // cleanup could run.
            subtitles::cleanup_work_dir(video_id).await;
            None
        }
    }
}

/// Extract a channel resource: `og:title` and description meta tags only.
#[instrument(level = "info", skip_all, fields(url = %source_url))]
pub async fn extract_channel(
    client: &reqwest::Client,
    identity: &ResourceIdentity,
    source_url: &str,
) -> Result<ExtractedRecord, ExtractError> {
    let handle = identity.primary_id().unwrap_or_default().to_string();

    let html = client
        .get(source_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let (title, description) = channel_fields(&html);
    if title.is_none() && description.is_none() {
        return Err(
            ExtractError::no_content("channel page exposed no metadata").with_partial(
                PartialRecord {
                    author: Some(handle),
                    ..Default::default()
                },
            ),
        );
    }

    Ok(ExtractedRecord {
        title: title.unwrap_or_default(),
        body: description.unwrap_or_default(),
        author: Some(handle),
        source_url: source_url.to_string(),
        ..Default::default()
    })
}

async fn fetch_oembed(client: &reqwest::Client, watch_url: &str) -> Result<OEmbed, ExtractError> {
    let oembed_url = format!(
        "https://www.youtube.com/oembed?url={}&format=json",
        urlencoding::encode(watch_url)
    );
    debug!(%oembed_url, "Fetching embed metadata");
    let oembed = client
        .get(&oembed_url)
        .send()
        .await?
        .error_for_status()?
        .json::<OEmbed>()
        .await?;
    Ok(oembed)
}

fn watch_url_for(kind: ResourceKind, video_id: &str) -> String {
    match kind {
        ResourceKind::Shorts => format!("https://www.youtube.com/shorts/{video_id}"),
        _ => format!("https://www.youtube.com/watch?v={video_id}"),
    }
}

/// Recover the video description from the watch page.
///
/// The player config embeds it as a JSON string; failing that, the
/// description meta tags are consulted.
pub(crate) fn page_description(html: &str) -> Option<String> {
    if let Some(caps) = SHORT_DESCRIPTION_RE.captures(html) {
        let unescaped = unescape_json_str(caps.get(1).unwrap().as_str());
        let cleaned = collapse_whitespace(&unescaped);
        if !cleaned.is_empty() {
            return Some(cleaned);
        }
    }
    let document = Html::parse_document(html);
    meta_content(&document, "og:description")
        .or_else(|| meta_content(&document, "description"))
        .map(|d| collapse_whitespace(&d))
        .filter(|d| !d.is_empty())
}

/// `og:title` and description of a channel page.
pub(crate) fn channel_fields(html: &str) -> (Option<String>, Option<String>) {
    let document = Html::parse_document(html);
    let title = meta_content(&document, "og:title").or_else(|| page_title(&document));
    let description = meta_content(&document, "og:description")
        .or_else(|| meta_content(&document, "description"));
    (title, description)
}

/// Unescape the subset of JSON string escapes the player config uses.
fn unescape_json_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(decoded) =
                    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                {
                    out.push(decoded);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
