//! Caption-track retrieval via an external subtitle tool.
//!
//! The video strategy optionally shells out to a `yt-dlp`-compatible tool to
//! pull a caption track, then flattens the track's timed-segment JSON into a
//! single transcript. The tool is a collaborator, not a requirement: its
//! absence degrades the video strategy to metadata-only extraction.
//!
//! Caption files are written to a per-video temp directory and deleted once
//! the transcript has been flattened.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::{ErrorKind, ExtractError};
use crate::normalize::collapse_whitespace;

/// Configuration for the external subtitle tool.
#[derive(Debug, Clone)]
pub struct SubtitleConfig {
    /// Binary name or path of the tool.
    pub tool: String,
    /// Preferred caption language.
    pub primary_lang: String,
    /// Second choice when the primary language has no track.
    pub fallback_lang: String,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            tool: "yt-dlp".to_string(),
            primary_lang: "en".to_string(),
            fallback_lang: "en-US".to_string(),
        }
    }
}

/// Timed-segment caption file, `json3` shape.
#[derive(Debug, Deserialize)]
struct CaptionFile {
    #[serde(default)]
    events: Vec<CaptionEvent>,
}

#[derive(Debug, Deserialize)]
struct CaptionEvent {
    #[serde(default)]
    segs: Option<Vec<CaptionSegment>>,
}

#[derive(Debug, Deserialize)]
struct CaptionSegment {
    #[serde(default)]
    utf8: Option<String>,
}

/// Fetch and flatten a caption track for a video.
///
/// Returns `Ok(None)` when the tool ran but produced no usable track (no
/// captions published, unsupported language). Returns `ToolUnavailable` when
/// the tool binary itself cannot be spawned.
#[instrument(level = "info", skip_all, fields(video_id = %video_id))]
pub async fn fetch_transcript(
    config: &SubtitleConfig,
    video_url: &str,
    video_id: &str,
) -> Result<Option<String>, ExtractError> {
    let work_dir = work_dir_for(video_id);
    tokio::fs::create_dir_all(&work_dir).await.map_err(|e| {
        ExtractError::new(
            ErrorKind::ToolUnavailable,
            format!("cannot create caption dir: {e}"),
        )
    })?;

    let output_template = work_dir.join("%(id)s").to_string_lossy().into_owned();
    let langs = format!("{},{}", config.primary_lang, config.fallback_lang);

    let spawned = Command::new(&config.tool)
        .arg("--skip-download")
        .arg("--write-subs")
        .arg("--write-auto-subs")
        .arg("--sub-format")
        .arg("json3")
        .arg("--sub-langs")
        .arg(&langs)
        .arg("--output")
        .arg(&output_template)
        .arg(video_url)
        // If the surrounding timeout drops this future, the child must not
        // be left running.
        .kill_on_drop(true)
        .output()
        .await;

    let result = match spawned {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExtractError::new(
            ErrorKind::ToolUnavailable,
            format!("subtitle tool `{}` not found", config.tool),
        )),
        Err(e) => {
            warn!(error = %e, tool = %config.tool, "Subtitle tool failed to run");
            Ok(None)
        }
        Ok(output) if !output.status.success() => {
            warn!(
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Subtitle tool exited non-zero"
            );
            Ok(None)
        }
        Ok(_) => read_best_track(&work_dir, video_id, config).await,
    };

    // Caption files are consumed once; always clean up the work dir.
    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        debug!(error = %e, "Could not remove caption dir");
    }

    result
}

fn work_dir_for(video_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sourcegrab-subs-{video_id}"))
}

/// Best-effort removal of a video's caption work dir, for callers whose
/// timeout dropped [`fetch_transcript`] before its own cleanup ran.
pub async fn cleanup_work_dir(video_id: &str) {
    let _ = tokio::fs::remove_dir_all(work_dir_for(video_id)).await;
}

async fn read_best_track(
    work_dir: &Path,
    video_id: &str,
    config: &SubtitleConfig,
) -> Result<Option<String>, ExtractError> {
    let tracks = list_tracks(work_dir, video_id).await;
    let Some((lang, path)) = pick_track(&tracks, &config.primary_lang, &config.fallback_lang)
    else {
        debug!("No caption track produced");
        return Ok(None);
    };

    debug!(lang = %lang, path = %path.display(), "Selected caption track");
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Could not read caption file");
            return Ok(None);
        }
    };
    Ok(flatten_json3(&raw))
}

/// Collect `(language, path)` pairs for `{video_id}.{lang}.json3` files.
async fn list_tracks(work_dir: &Path, video_id: &str) -> Vec<(String, PathBuf)> {
    let mut tracks = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(work_dir).await else {
        return tracks;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let prefix = format!("{video_id}.");
        if let Some(rest) = name.strip_prefix(&prefix) {
            if let Some(lang) = rest.strip_suffix(".json3") {
                tracks.push((lang.to_string(), entry.path()));
            }
        }
    }
    tracks
}

/// Select the track to use: exact primary language, then primary as a
/// language prefix, then fallback, then whatever is available.
fn pick_track<'a>(
    tracks: &'a [(String, PathBuf)],
    primary: &str,
    fallback: &str,
) -> Option<&'a (String, PathBuf)> {
    tracks
        .iter()
        .find(|(lang, _)| lang == primary)
        .or_else(|| {
            tracks
                .iter()
                .find(|(lang, _)| lang.starts_with(&format!("{primary}-")))
        })
        .or_else(|| tracks.iter().find(|(lang, _)| lang == fallback))
        .or_else(|| tracks.first())
}

/// Flatten a `json3` caption document into one whitespace-normalized
/// transcript. Returns `None` for unparseable or empty documents.
fn flatten_json3(raw: &str) -> Option<String> {
    let file: CaptionFile = serde_json::from_str(raw).ok()?;
    let mut parts: Vec<String> = Vec::new();
    for event in file.events {
        let Some(segs) = event.segs else { continue };
        for seg in segs {
            if let Some(text) = seg.utf8 {
                let text = collapse_whitespace(&text);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
