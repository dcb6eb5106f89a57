//! Client identities, polite delays, and timeout enforcement.
//!
//! Every HTTP-based strategy goes through this layer. It rotates between a
//! fixed pool of modern desktop browser signatures, derives a header set
//! consistent with each signature's engine family, injects randomized delays
//! before generic-site requests, and races every network step against a
//! timeout budget so a stalled upstream fails fast instead of hanging.

use rand::{rng, Rng};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::ExtractError;

/// Timeout budget for a generic-site fetch.
pub const GENERIC_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout budget for a platform endpoint fetch (oEmbed, post page, channel page).
pub const PLATFORM_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout budget for a full headless-browser session.
pub const AUTOMATION_TIMEOUT: Duration = Duration::from_secs(40);
/// Timeout budget for one run of the external subtitle tool.
pub const SUBTITLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounds of the randomized pre-request delay for generic sites.
const POLITE_DELAY_MS: (u64, u64) = (500, 2000);

/// One browser signature plus the header set matching its engine family.
///
/// Headers are never mixed across identities within one request: a Chrome
/// user agent always ships Chrome's `Sec-Ch-Ua` family, a Firefox user agent
/// ships none of it.
#[derive(Debug)]
pub struct BrowserIdentity {
    pub user_agent: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
}

const CHROME_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const GECKO_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const WEBKIT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

static CHROME_WIN_HEADERS: &[(&str, &str)] = &[
    ("accept", CHROME_ACCEPT),
    ("accept-language", "en-US,en;q=0.9"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("sec-ch-ua", "\"Chromium\";v=\"131\", \"Google Chrome\";v=\"131\", \"Not_A Brand\";v=\"24\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("upgrade-insecure-requests", "1"),
];

static CHROME_MAC_HEADERS: &[(&str, &str)] = &[
    ("accept", CHROME_ACCEPT),
    ("accept-language", "en-US,en;q=0.9"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("sec-ch-ua", "\"Chromium\";v=\"131\", \"Google Chrome\";v=\"131\", \"Not_A Brand\";v=\"24\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"macOS\""),
    ("upgrade-insecure-requests", "1"),
];

static EDGE_WIN_HEADERS: &[(&str, &str)] = &[
    ("accept", CHROME_ACCEPT),
    ("accept-language", "en-US,en;q=0.9"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("sec-ch-ua", "\"Chromium\";v=\"131\", \"Microsoft Edge\";v=\"131\", \"Not_A Brand\";v=\"24\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("upgrade-insecure-requests", "1"),
];

static FIREFOX_HEADERS: &[(&str, &str)] = &[
    ("accept", GECKO_ACCEPT),
    ("accept-language", "en-US,en;q=0.5"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
];

static SAFARI_HEADERS: &[(&str, &str)] = &[
    ("accept", WEBKIT_ACCEPT),
    ("accept-language", "en-US,en;q=0.9"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("upgrade-insecure-requests", "1"),
];

/// The fixed, read-only identity pool.
pub static IDENTITY_POOL: &[BrowserIdentity] = &[
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        headers: CHROME_WIN_HEADERS,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        headers: CHROME_MAC_HEADERS,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        headers: EDGE_WIN_HEADERS,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        headers: FIREFOX_HEADERS,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
        headers: FIREFOX_HEADERS,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
        headers: SAFARI_HEADERS,
    },
];

/// Select one identity from the pool uniformly at random.
pub fn pick_identity() -> &'static BrowserIdentity {
    let idx = rng().random_range(0..IDENTITY_POOL.len());
    &IDENTITY_POOL[idx]
}

/// Deterministic selection for tests; wraps around the pool.
pub fn identity_at(index: usize) -> &'static BrowserIdentity {
    &IDENTITY_POOL[index % IDENTITY_POOL.len()]
}

/// Build the header map for an identity, user agent included.
pub fn header_map(identity: &BrowserIdentity) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(identity.headers.len() + 1);
    map.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));
    for (name, value) in identity.headers {
        map.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    map
}

/// Build an HTTP client wearing the given identity.
///
/// Redirects are capped at the platform-default five hops; the overall
/// request deadline is enforced separately by [`with_timeout`].
pub fn build_client(identity: &BrowserIdentity) -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .default_headers(header_map(identity))
        .redirect(reqwest::redirect::Policy::limited(5))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(ExtractError::from)
}

/// Suspend for a uniformly random duration in [500ms, 2000ms].
///
/// Applied before generic-site requests to reduce the chance of
/// automated-traffic detection. Platform strategies hitting lower-volume
/// endpoints skip this.
pub async fn polite_delay() {
    let ms = rng().random_range(POLITE_DELAY_MS.0..=POLITE_DELAY_MS.1);
    debug!(delay_ms = ms, "Polite delay before request");
    sleep(Duration::from_millis(ms)).await;
}

/// Race an operation against its timeout budget.
///
/// On expiry the underlying future is dropped (cancelling any in-flight
/// request) and a `Timeout` failure is raised instead of hanging.
pub async fn with_timeout<T, F>(
    budget: Duration,
    step: &str,
    fut: F,
) -> Result<T, ExtractError>
where
    F: Future<Output = Result<T, ExtractError>>,
{
    match timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(step, budget_ms = budget.as_millis() as u64, "Step timed out");
            Err(ExtractError::timeout(step, budget.as_millis()))
        }
    }
}
