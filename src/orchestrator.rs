//! Extraction orchestration: classify, route, enforce budgets, shape results.
//!
//! The [`Extractor`] is the engine's entry point. Each call is independent
//! and stateless; the only shared state is the fixed, read-only identity the
//! HTTP client was built with. Network and automation steps run sequentially
//! within one call, each wrapped in its timeout budget. The orchestrator
//! never retries; callers may re-invoke at their discretion.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::classify::classify;
use crate::error::{ErrorKind, ExtractError};
use crate::models::{
    ExtractedRecord, ExtractionOutcome, Platform, ResourceIdentity, ResourceKind,
};
use crate::resilience::{
    self, with_timeout, BrowserIdentity, AUTOMATION_TIMEOUT, GENERIC_FETCH_TIMEOUT,
    PLATFORM_FETCH_TIMEOUT,
};
use crate::strategies::automation::{self, AutomationTuning, BrowserProvider};
use crate::strategies::generic::{self, SelectorConfig};
use crate::strategies::{microblog, video};
use crate::subtitles::SubtitleConfig;

/// The content extraction engine.
///
/// Holds a client wearing one randomly selected browser identity, plus the
/// optional collaborators: a headless-browser provider for client-rendered
/// platforms and a subtitle tool configuration for video transcripts.
pub struct Extractor {
    client: reqwest::Client,
    browser: Option<Arc<dyn BrowserProvider>>,
    tuning: AutomationTuning,
    subtitles: Option<SubtitleConfig>,
    polite: bool,
}

impl Extractor {
    /// Build an extractor with a random identity and default settings.
    pub fn new() -> Result<Self, ExtractError> {
        Self::with_identity(resilience::pick_identity())
    }

    /// Build an extractor wearing a specific identity (deterministic tests).
    pub fn with_identity(identity: &BrowserIdentity) -> Result<Self, ExtractError> {
        Ok(Self {
            client: resilience::build_client(identity)?,
            browser: None,
            tuning: AutomationTuning::default(),
            subtitles: Some(SubtitleConfig::default()),
            polite: true,
        })
    }

    /// Attach a headless-browser provider for client-rendered platforms.
    pub fn with_browser(mut self, provider: Arc<dyn BrowserProvider>) -> Self {
        self.browser = Some(provider);
        self
    }

    /// Override the automation wait/scroll tuning.
    pub fn with_tuning(mut self, tuning: AutomationTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Configure or disable subtitle retrieval.
    pub fn with_subtitles(mut self, config: Option<SubtitleConfig>) -> Self {
        self.subtitles = config;
        self
    }

    /// Disable the randomized pre-request delay (tests).
    pub fn without_polite_delay(mut self) -> Self {
        self.polite = false;
        self
    }

    /// Extract a single resource: video, microblog post/profile, or a
    /// generic page when nothing classifies.
    #[instrument(level = "info", skip(self), fields(%url))]
    pub async fn extract(&self, url: &str, platform_hint: Option<Platform>) -> ExtractionOutcome {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ExtractError::new(
                    ErrorKind::InvalidUrl,
                    format!("not an absolute URL: {e}"),
                )
                .into();
            }
        };

        let result = match classify(&parsed, platform_hint) {
            Some(identity) => self.route(&identity, url).await,
            None => {
                debug!("URL did not classify; using generic extraction");
                self.generic_single(url).await
            }
        };

        match result {
            Ok(record) => self.finalize(record),
            Err(e) => {
                warn!(kind = ?e.kind, message = %e.message, "Extraction failed");
                e.into()
            }
        }
    }

    /// Extract a listing page (multiple records).
    #[instrument(level = "info", skip(self, config), fields(%url))]
    pub async fn extract_listing(
        &self,
        url: &str,
        config: Option<&SelectorConfig>,
    ) -> Result<Vec<ExtractedRecord>, ExtractError> {
        Url::parse(url)
            .map_err(|e| ExtractError::new(ErrorKind::InvalidUrl, format!("not an absolute URL: {e}")))?;
        if self.polite {
            resilience::polite_delay().await;
        }
        with_timeout(
            GENERIC_FETCH_TIMEOUT,
            "generic listing fetch",
            generic::extract_listing(&self.client, url, config),
        )
        .await
    }

    async fn route(
        &self,
        identity: &ResourceIdentity,
        url: &str,
    ) -> Result<ExtractedRecord, ExtractError> {
        info!(platform = %identity.platform, kind = ?identity.kind, "Routing extraction");
        match (identity.platform, identity.kind) {
            (Platform::Video, ResourceKind::Channel) => {
                with_timeout(
                    PLATFORM_FETCH_TIMEOUT,
                    "channel page fetch",
                    video::extract_channel(&self.client, identity, url),
                )
                .await
            }
            (Platform::Video, _) => {
                // Budgets are enforced per step inside the strategy: the
                // subtitle tool gets its own soft budget instead of sharing
                // the network fetch budget.
                video::extract_video(&self.client, identity, url, self.subtitles.as_ref()).await
            }
            (Platform::Microblog, ResourceKind::Post) => {
                with_timeout(
                    PLATFORM_FETCH_TIMEOUT,
                    "post page fetch",
                    microblog::extract_post(&self.client, url, identity.primary_id()),
                )
                .await
            }
            (Platform::Microblog, _) => {
                let handle = identity.primary_id().unwrap_or_default();
                with_timeout(
                    PLATFORM_FETCH_TIMEOUT,
                    "profile page fetch",
                    microblog::extract_profile(&self.client, url, handle),
                )
                .await
            }
            (Platform::FederatedMicroblog, kind) => {
                let Some(provider) = self.browser.as_deref() else {
                    return Err(ExtractError::new(
                        ErrorKind::AutomationUnavailable,
                        "no headless-browser provider configured",
                    ));
                };
                let handle = identity.primary_id().unwrap_or_default();
                // The budget is enforced inside the strategy so the remote
                // page still gets closed when the session times out.
                match kind {
                    ResourceKind::Post => {
                        automation::extract_post(
                            provider,
                            url,
                            Some(handle),
                            &self.tuning,
                            AUTOMATION_TIMEOUT,
                        )
                        .await
                    }
                    _ => {
                        automation::extract_profile_feed(
                            provider,
                            url,
                            handle,
                            &self.tuning,
                            AUTOMATION_TIMEOUT,
                        )
                        .await
                    }
                }
            }
            (Platform::Generic, _) => self.generic_single(url).await,
        }
    }

    /// Single-record shaping of the generic extractor's first listing entry.
    async fn generic_single(&self, url: &str) -> Result<ExtractedRecord, ExtractError> {
        if self.polite {
            resilience::polite_delay().await;
        }
        let records = with_timeout(
            GENERIC_FETCH_TIMEOUT,
            "generic page fetch",
            generic::extract_listing(&self.client, url, None),
        )
        .await?;

        records.into_iter().next().ok_or_else(|| {
            ExtractError::no_content("generic extraction found no article entries")
        })
    }

    /// Enforce the success invariant: a record with neither body nor media
    /// is a `NoContentFound` failure, not a hollow success.
    fn finalize(&self, record: ExtractedRecord) -> ExtractionOutcome {
        if record.is_hollow() {
            let partial = record.to_partial();
            return ExtractError::no_content("extraction produced an empty record")
                .with_partial(partial)
                .into();
        }
        record.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::identity_at;

    fn extractor() -> Extractor {
        Extractor::with_identity(identity_at(0))
            .unwrap()
            .without_polite_delay()
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let outcome = extractor().extract("not a url", None).await;
        match outcome {
            ExtractionOutcome::Failure { kind, .. } => assert_eq!(kind, ErrorKind::InvalidUrl),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_listing_rejects_relative_url() {
        let err = extractor()
            .extract_listing("/relative/path", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn test_federated_without_provider_is_automation_unavailable() {
        let outcome = extractor()
            .extract("https://threads.net/@alice", None)
            .await;
        match outcome {
            ExtractionOutcome::Failure { kind, .. } => {
                assert_eq!(kind, ErrorKind::AutomationUnavailable)
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_finalize_rejects_hollow_records() {
        let record = ExtractedRecord {
            title: "Alice".to_string(),
            author: Some("@alice".to_string()),
            source_url: "https://example.com".to_string(),
            ..Default::default()
        };
        let outcome = extractor().finalize(record);
        match outcome {
            ExtractionOutcome::Failure { kind, partial, .. } => {
                assert_eq!(kind, ErrorKind::NoContentFound);
                assert_eq!(partial.unwrap().author.as_deref(), Some("@alice"));
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn test_finalize_accepts_media_only_records() {
        let record = ExtractedRecord {
            media_urls: vec!["https://cdn.example/a.jpg".to_string()],
            source_url: "https://example.com".to_string(),
            ..Default::default()
        };
        assert!(extractor().finalize(record).is_success());
    }
}
