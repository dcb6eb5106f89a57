//! Browser-automation strategy for client-rendered platforms.
//!
//! Some platforms ship an empty HTML shell and materialize content only
//! after script execution. This strategy drives a remote headless-browser
//! page through a narrow vendor-agnostic interface: navigate, wait for the
//! page to settle, optionally nudge lazy-loaded content with one midpoint
//! scroll, then run an in-page extraction script and marshal its structured
//! result back.
//!
//! The in-page scripts are pure, stateless functions of the live DOM; they
//! mirror the lightweight-DOM cascade but see the hydrated document instead
//! of the initial payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use std::time::Duration;

use crate::error::ExtractError;
use crate::models::{Engagement, ExtractedRecord, FeedPost, PartialRecord};
use crate::normalize::{collapse_whitespace, dedupe_urls};
use crate::resilience::with_timeout;

/// A live page inside a remote headless-browser session.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Run a script in the page and return its JSON-marshalled result.
    async fn eval(&self, script: &str) -> Result<Value, ExtractError>;
    /// Suspend while the page keeps rendering.
    async fn wait_ms(&self, ms: u64) -> Result<(), ExtractError>;
    /// One programmatic scroll to the page's vertical midpoint.
    async fn scroll_to_midpoint(&self) -> Result<(), ExtractError>;
    /// Close the page, releasing the remote session.
    async fn close(self: Box<Self>) -> Result<(), ExtractError>;
}

/// Opens pages in a remote headless browser.
#[async_trait]
pub trait BrowserProvider: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn BrowserPage>, ExtractError>;
}

/// Empirically tuned wait/scroll knobs.
///
/// The settle timings are magic numbers tuned against one platform; they are
/// configuration precisely because they do not generalize to unrelated ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationTuning {
    /// Wait after navigation, before any extraction, to allow hydration.
    pub settle_ms: u64,
    /// Wait after the midpoint scroll for lazy-loaded content.
    pub scroll_settle_ms: u64,
    /// Whether to perform the midpoint scroll at all.
    pub midpoint_scroll: bool,
    /// Profile-feed post cap. Clamped to [`MAX_FEED_POSTS`].
    pub post_limit: usize,
}

/// Hard ceiling on profile-feed posts per run.
pub const MAX_FEED_POSTS: usize = 20;

impl Default for AutomationTuning {
    fn default() -> Self {
        Self {
            settle_ms: 3500,
            scroll_settle_ms: 1500,
            midpoint_scroll: true,
            post_limit: 10,
        }
    }
}

impl AutomationTuning {
    pub fn effective_post_limit(&self) -> usize {
        self.post_limit.clamp(1, MAX_FEED_POSTS)
    }
}

/// Result shape marshalled back from the in-page post script.
#[derive(Debug, Default, Deserialize)]
struct PagePostResult {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    media: Vec<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    likes: Option<String>,
    #[serde(default)]
    replies: Option<String>,
}

/// Result shape marshalled back from the in-page profile-feed script.
#[derive(Debug, Default, Deserialize)]
struct PageFeedResult {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    posts: Vec<PageFeedPost>,
}

#[derive(Debug, Deserialize)]
struct PageFeedPost {
    permalink: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    media: Vec<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    likes: Option<String>,
    #[serde(default)]
    replies: Option<String>,
}

/// In-page script extracting a single hydrated post.
///
/// Mirrors the lightweight-DOM cascade: content-marker element first, then
/// `og:description`, then the document title.
const POST_SCRIPT: &str = r#"(() => {
  const meta = (k) => {
    const el = document.querySelector(`meta[property="${k}"], meta[name="${k}"]`);
    return el ? el.getAttribute('content') : null;
  };
  const article = document.querySelector('article') || document;
  const marker = article.querySelector('[data-pressable-container] span, [data-testid="post-text"]');
  let content = marker ? marker.textContent : null;
  if (!content) {
    const og = meta('og:description');
    content = og ? og.replace(/^@[\w.]+:\s*/, '') : null;
  }
  if (!content) content = document.title || null;
  const media = Array.from(article.querySelectorAll('img[src], video[src]'))
    .map((el) => el.getAttribute('src'))
    .filter((src) => src && !/profile|avatar/i.test(src));
  const timeEl = article.querySelector('time[datetime]');
  const authorLink = article.querySelector('a[href^="/@"]');
  return {
    content,
    author: authorLink ? authorLink.getAttribute('href').slice(1).split('/')[0] : null,
    media,
    timestamp: timeEl ? timeEl.getAttribute('datetime') : null,
    likes: null,
    replies: null,
  };
})()"#;

/// In-page script walking a hydrated profile feed.
///
/// Candidate containers are semantic `article` elements, capped at the
/// caller's limit. Permalinks prefer anchors wrapping a `time` element (the
/// timestamp link is always the post's own permalink); posts are deduplicated
/// by permalink.
const PROFILE_SCRIPT: &str = r#"(() => {
  const LIMIT = __LIMIT__;
  const meta = (k) => {
    const el = document.querySelector(`meta[property="${k}"], meta[name="${k}"]`);
    return el ? el.getAttribute('content') : null;
  };
  const permalinkOf = (article) => {
    const timed = Array.from(article.querySelectorAll('a[href*="/post/"]'))
      .find((a) => a.querySelector('time'));
    const anchor = timed || article.querySelector('a[href*="/post/"]');
    return anchor ? new URL(anchor.getAttribute('href'), location.origin).href : null;
  };
  const posts = [];
  const seen = new Set();
  for (const article of document.querySelectorAll('article')) {
    if (posts.length >= LIMIT) break;
    const permalink = permalinkOf(article);
    if (!permalink || seen.has(permalink)) continue;
    seen.add(permalink);
    const textEl = article.querySelector('[data-pressable-container] span, [data-testid="post-text"]');
    const timeEl = article.querySelector('time[datetime]');
    posts.push({
      permalink,
      content: textEl ? textEl.textContent : null,
      media: Array.from(article.querySelectorAll('img[src], video[src]'))
        .map((el) => el.getAttribute('src'))
        .filter((src) => src && !/profile|avatar/i.test(src)),
      timestamp: timeEl ? timeEl.getAttribute('datetime') : null,
      likes: null,
      replies: null,
    });
  }
  const avatarEl = document.querySelector('img[alt*="profile picture" i], header img[src]');
  return {
    display_name: meta('og:title') || document.title || null,
    bio: meta('og:description'),
    avatar: avatarEl ? avatarEl.getAttribute('src') : null,
    posts,
  };
})()"#;

/// Extract a single client-rendered post.
#[instrument(level = "info", skip(provider, tuning), fields(url = %source_url))]
pub async fn extract_post(
    provider: &dyn BrowserProvider,
    source_url: &str,
    url_handle: Option<&str>,
    tuning: &AutomationTuning,
    budget: Duration,
) -> Result<ExtractedRecord, ExtractError> {
    let value = run_in_page(provider, source_url, tuning, POST_SCRIPT, budget).await?;
    let result: PagePostResult = serde_json::from_value(value)
        .map_err(|e| ExtractError::no_content(format!("malformed in-page result: {e}")))?;
    shape_post(result, url_handle, source_url)
}

/// Extract a client-rendered profile feed.
#[instrument(level = "info", skip(provider, tuning), fields(url = %source_url))]
pub async fn extract_profile_feed(
    provider: &dyn BrowserProvider,
    source_url: &str,
    url_handle: &str,
    tuning: &AutomationTuning,
    budget: Duration,
) -> Result<ExtractedRecord, ExtractError> {
    let script = PROFILE_SCRIPT.replace("__LIMIT__", &tuning.effective_post_limit().to_string());
    let value = run_in_page(provider, source_url, tuning, &script, budget).await?;
    let result: PageFeedResult = serde_json::from_value(value)
        .map_err(|e| ExtractError::no_content(format!("malformed in-page result: {e}")))?;
    shape_feed(result, url_handle, source_url)
}

/// Cap on releasing a remote page; a hung close must not stall the call.
const PAGE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Navigate, settle, optionally scroll, evaluate, close.
///
/// One budget covers the whole session: the settle/scroll/eval steps get
/// whatever the open left of it. On expiry those are cancelled but the
/// close still runs, so a remote session is released on every completion
/// path rather than leaked.
async fn run_in_page(
    provider: &dyn BrowserProvider,
    url: &str,
    tuning: &AutomationTuning,
    script: &str,
    budget: Duration,
) -> Result<Value, ExtractError> {
    let started = tokio::time::Instant::now();
    let page = with_timeout(budget, "browser page open", provider.open(url)).await?;
    debug!(settle_ms = tuning.settle_ms, "Page opened; settling");

    let remaining = budget.saturating_sub(started.elapsed());
    let result = with_timeout(remaining, "browser automation session", async {
        page.wait_ms(tuning.settle_ms).await?;
        if tuning.midpoint_scroll {
            page.scroll_to_midpoint().await?;
            page.wait_ms(tuning.scroll_settle_ms).await?;
        }
        page.eval(script).await
    })
    .await;

    if let Err(e) = with_timeout(PAGE_CLOSE_TIMEOUT, "browser page close", page.close()).await {
        warn!(error = %e, "Browser page close failed");
    }
    result
}

fn shape_post(
    result: PagePostResult,
    url_handle: Option<&str>,
    source_url: &str,
) -> Result<ExtractedRecord, ExtractError> {
    let body = result
        .content
        .map(|c| collapse_whitespace(&c))
        .unwrap_or_default();
    let media_urls = dedupe_urls(result.media);
    let author = url_handle
        .map(|h| format!("@{}", h.trim_start_matches('@')))
        .or(result.author);

    if body.is_empty() && media_urls.is_empty() {
        return Err(
            ExtractError::no_content("hydrated post exposed no content or media").with_partial(
                PartialRecord {
                    author: author.clone(),
                    ..Default::default()
                },
            ),
        );
    }

    Ok(ExtractedRecord {
        body,
        author,
        published_at: result.timestamp,
        media_urls,
        engagement: engagement_from(result.likes.as_deref(), result.replies.as_deref()),
        source_url: source_url.to_string(),
        ..Default::default()
    })
}

fn shape_feed(
    result: PageFeedResult,
    url_handle: &str,
    source_url: &str,
) -> Result<ExtractedRecord, ExtractError> {
    let display_name = result.display_name.map(|d| collapse_whitespace(&d));
    let bio = result.bio.map(|b| collapse_whitespace(&b));

    let posts: Vec<FeedPost> = result
        .posts
        .into_iter()
        .map(|p| FeedPost {
            permalink: p.permalink,
            content: p
                .content
                .map(|c| collapse_whitespace(&c))
                .unwrap_or_default(),
            media_urls: dedupe_urls(p.media),
            timestamp: p.timestamp,
            engagement: engagement_from(p.likes.as_deref(), p.replies.as_deref()),
        })
        .collect();

    if posts.is_empty() {
        // Distinct from a technical fault: usually a private or empty profile.
        return Err(
            ExtractError::no_content("profile feed contained no posts").with_partial(
                PartialRecord {
                    author: Some(format!("@{url_handle}")),
                    display_name,
                    bio,
                    avatar_url: result.avatar,
                },
            ),
        );
    }

    info!(post_count = posts.len(), "Extracted profile feed");
    Ok(ExtractedRecord {
        title: display_name.unwrap_or_default(),
        body: bio.unwrap_or_default(),
        author: Some(format!("@{url_handle}")),
        media_urls: result.avatar.into_iter().collect(),
        source_url: source_url.to_string(),
        posts,
        ..Default::default()
    })
}

fn engagement_from(likes: Option<&str>, replies: Option<&str>) -> Option<Engagement> {
    let engagement = Engagement {
        likes: likes.and_then(crate::normalize::parse_count),
        replies: replies.and_then(crate::normalize::parse_count),
    };
    if engagement.is_empty() {
        None
    } else {
        Some(engagement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted page for tests: returns a canned eval result and records
    /// whether it was closed.
    struct FakePage {
        result: Value,
        closed: Arc<AtomicBool>,
        waits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn eval(&self, _script: &str) -> Result<Value, ExtractError> {
            Ok(self.result.clone())
        }
        async fn wait_ms(&self, _ms: u64) -> Result<(), ExtractError> {
            self.waits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn scroll_to_midpoint(&self) -> Result<(), ExtractError> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<(), ExtractError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeProvider {
        result: Value,
        closed: Arc<AtomicBool>,
        waits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserProvider for FakeProvider {
        async fn open(&self, _url: &str) -> Result<Box<dyn BrowserPage>, ExtractError> {
            Ok(Box::new(FakePage {
                result: self.result.clone(),
                closed: self.closed.clone(),
                waits: self.waits.clone(),
            }))
        }
    }

    fn provider_with(result: Value) -> (FakeProvider, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicBool::new(false));
        let waits = Arc::new(AtomicUsize::new(0));
        (
            FakeProvider {
                result,
                closed: closed.clone(),
                waits: waits.clone(),
            },
            closed,
            waits,
        )
    }

    #[tokio::test]
    async fn test_post_extraction_closes_page() {
        let (provider, closed, waits) = provider_with(json!({
            "content": "hydrated  text",
            "media": ["https://cdn.example/a.jpg"],
            "timestamp": "2026-01-02T03:04:05Z",
        }));
        let tuning = AutomationTuning::default();
        let record = extract_post(
            &provider,
            "https://threads.net/@alice/post/x1",
            Some("alice"),
            &tuning,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(record.body, "hydrated text");
        assert_eq!(record.author.as_deref(), Some("@alice"));
        assert_eq!(record.published_at.as_deref(), Some("2026-01-02T03:04:05Z"));
        assert!(closed.load(Ordering::SeqCst));
        // Settle wait plus post-scroll wait.
        assert_eq!(waits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_feed_is_no_content_with_partial() {
        let (provider, closed, _) = provider_with(json!({
            "display_name": "Alice",
            "bio": "hello",
            "avatar": "https://cdn.example/avatar.jpg",
            "posts": [],
        }));
        let tuning = AutomationTuning::default();
        let err = extract_profile_feed(
            &provider,
            "https://threads.net/@alice",
            "alice",
            &tuning,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NoContentFound);
        let partial = err.partial.unwrap();
        assert_eq!(partial.display_name.as_deref(), Some("Alice"));
        assert_eq!(partial.bio.as_deref(), Some("hello"));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_feed_posts_are_shaped() {
        let (provider, _, _) = provider_with(json!({
            "display_name": "Alice",
            "bio": "hello",
            "posts": [
                {
                    "permalink": "https://threads.net/@alice/post/x1",
                    "content": "first\npost",
                    "media": ["https://cdn.example/1.jpg", "https://cdn.example/1.jpg"],
                    "timestamp": "2026-01-01T00:00:00Z",
                    "likes": "1.2K",
                },
                {
                    "permalink": "https://threads.net/@alice/post/x2",
                },
            ],
        }));
        let tuning = AutomationTuning::default();
        let record = extract_profile_feed(
            &provider,
            "https://threads.net/@alice",
            "alice",
            &tuning,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(record.title, "Alice");
        assert_eq!(record.posts.len(), 2);
        assert_eq!(record.posts[0].content, "first post");
        assert_eq!(record.posts[0].media_urls.len(), 1);
        assert_eq!(record.posts[0].engagement.unwrap().likes, Some(1200));
        assert!(record.posts[1].content.is_empty());
    }

    /// Page whose settle wait never resolves.
    struct HangingPage {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserPage for HangingPage {
        async fn eval(&self, _script: &str) -> Result<Value, ExtractError> {
            Ok(Value::Null)
        }
        async fn wait_ms(&self, _ms: u64) -> Result<(), ExtractError> {
            std::future::pending().await
        }
        async fn scroll_to_midpoint(&self) -> Result<(), ExtractError> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<(), ExtractError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct HangingProvider {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserProvider for HangingProvider {
        async fn open(&self, _url: &str) -> Result<Box<dyn BrowserPage>, ExtractError> {
            Ok(Box::new(HangingPage {
                closed: self.closed.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_timed_out_session_still_closes_page() {
        let closed = Arc::new(AtomicBool::new(false));
        let provider = HangingProvider {
            closed: closed.clone(),
        };
        let tuning = AutomationTuning::default();
        let err = extract_post(
            &provider,
            "https://threads.net/@alice/post/x1",
            Some("alice"),
            &tuning,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(closed.load(Ordering::SeqCst));
    }

    /// Provider whose open eats most of the budget before handing back a
    /// page that then hangs.
    struct SlowOpenProvider {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserProvider for SlowOpenProvider {
        async fn open(&self, _url: &str) -> Result<Box<dyn BrowserPage>, ExtractError> {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Ok(Box::new(HangingPage {
                closed: self.closed.clone(),
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_time_counts_against_session_budget() {
        let closed = Arc::new(AtomicBool::new(false));
        let provider = SlowOpenProvider {
            closed: closed.clone(),
        };
        let tuning = AutomationTuning::default();
        let started = tokio::time::Instant::now();
        let err = extract_post(
            &provider,
            "https://threads.net/@alice/post/x1",
            Some("alice"),
            &tuning,
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        // The 400ms open leaves 100ms of session budget, not a fresh 500ms.
        assert!(started.elapsed() <= Duration::from_millis(600));
        assert!(closed.load(Ordering::SeqCst));
    }

    /// Page that answers normally but never finishes closing.
    struct StickyClosePage;

    #[async_trait]
    impl BrowserPage for StickyClosePage {
        async fn eval(&self, _script: &str) -> Result<Value, ExtractError> {
            Ok(json!({ "content": "hi" }))
        }
        async fn wait_ms(&self, _ms: u64) -> Result<(), ExtractError> {
            Ok(())
        }
        async fn scroll_to_midpoint(&self) -> Result<(), ExtractError> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<(), ExtractError> {
            std::future::pending().await
        }
    }

    struct StickyCloseProvider;

    #[async_trait]
    impl BrowserProvider for StickyCloseProvider {
        async fn open(&self, _url: &str) -> Result<Box<dyn BrowserPage>, ExtractError> {
            Ok(Box::new(StickyClosePage))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_close_does_not_stall_the_call() {
        let tuning = AutomationTuning::default();
        let record = extract_post(
            &StickyCloseProvider,
            "https://threads.net/@alice/post/x1",
            Some("alice"),
            &tuning,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(record.body, "hi");
    }

    #[test]
    fn test_post_limit_is_clamped() {
        let mut tuning = AutomationTuning::default();
        assert_eq!(tuning.effective_post_limit(), 10);
        tuning.post_limit = 50;
        assert_eq!(tuning.effective_post_limit(), MAX_FEED_POSTS);
        tuning.post_limit = 0;
        assert_eq!(tuning.effective_post_limit(), 1);
    }

    #[test]
    fn test_profile_script_embeds_limit() {
        let script = PROFILE_SCRIPT.replace("__LIMIT__", "10");
        assert!(script.contains("const LIMIT = 10;"));
        assert!(!script.contains("__LIMIT__"));
    }
}
