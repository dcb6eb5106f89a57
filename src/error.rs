//! Error taxonomy for extraction calls.
//!
//! Strategies never throw across soft-fallback boundaries: a failed
//! page-description fetch or a missing subtitle tool is absorbed internally
//! and the call still succeeds with reduced fields. Hard failures propagate
//! as an [`ExtractError`] carrying the most specific [`ErrorKind`] available,
//! plus whatever [`PartialRecord`] fields were recovered before the failure.

use serde::Serialize;
use thiserror::Error;

use crate::models::PartialRecord;

/// Classification of an extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input does not parse as an absolute URL, or matches no platform and
    /// generic extraction also fails.
    #[error("invalid url")]
    InvalidUrl,
    /// Non-success status (or transport error) from a platform endpoint.
    #[error("upstream http error")]
    UpstreamHttp,
    /// A step exceeded its timeout budget.
    #[error("timeout")]
    Timeout,
    /// Technically successful fetch, but no extractable content. Usually
    /// reflects private, empty, or deleted content rather than a fault.
    #[error("no content found")]
    NoContentFound,
    /// Headless-browser collaborator not configured or not reachable.
    #[error("automation unavailable")]
    AutomationUnavailable,
    /// Optional subtitle tool missing. Soft at the video strategy, hard at
    /// call sites that require transcripts.
    #[error("tool unavailable")]
    ToolUnavailable,
}

/// A failed extraction step.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ExtractError {
    pub kind: ErrorKind,
    pub message: String,
    /// Fields recovered before the failure, for degraded presentation.
    pub partial: Option<PartialRecord>,
}

impl ExtractError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            partial: None,
        }
    }

    pub fn timeout(step: &str, budget_ms: u128) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("{step} exceeded its {budget_ms}ms budget"),
        )
    }

    pub fn no_content(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoContentFound, message)
    }

    /// Attach a best-effort partial record to this failure.
    pub fn with_partial(mut self, partial: PartialRecord) -> Self {
        if !partial.is_empty() {
            self.partial = Some(partial);
        }
        self
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ExtractError::new(ErrorKind::Timeout, e.to_string());
        }
        let message = match e.status() {
            Some(status) => format!("HTTP {status} from {}", url_of(&e)),
            None => e.to_string(),
        };
        ExtractError::new(ErrorKind::UpstreamHttp, message)
    }
}

impl From<url::ParseError> for ExtractError {
    fn from(e: url::ParseError) -> Self {
        ExtractError::new(ErrorKind::InvalidUrl, e.to_string())
    }
}

fn url_of(e: &reqwest::Error) -> String {
    e.url().map(|u| u.to_string()).unwrap_or_default()
}
