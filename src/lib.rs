//! # sourcegrab
//!
//! A best-effort content extraction engine. Given an arbitrary URL pointing
//! at a video platform, a microblog post or profile, a client-rendered
//! federated microblog, or any blog/news site, it recovers a normalized
//! `{title, author, body, media, engagement, timestamp}` record despite each
//! source exposing a different, unstable, and partially hostile surface.
//!
//! ## Architecture
//!
//! A call flows through a fixed pipeline:
//! 1. **Classification**: URL patterns decide platform, resource kind, and
//!    identifiers; unknown URLs fall through to the generic extractor
//! 2. **Strategy**: one extraction strategy per platform family, each an
//!    ordered fallback chain rather than a single brittle selector
//! 3. **Resilience**: rotated client identities, randomized polite delays,
//!    and per-route timeout budgets around every network step
//! 4. **Normalization**: engagement-count parsing, URL resolution and
//!    deduplication, whitespace collapsing
//!
//! The engine is a pure request/response transformation layer: no retries,
//! no persisted state, no cross-call shared mutable state. Concurrent calls
//! are independent; throttling across calls is the caller's concern.
//!
//! ## Usage
//!
//! ```ignore
//! let extractor = Extractor::new()?;
//! match extractor.extract("https://youtu.be/dQw4w9WgXcQ", None).await {
//!     ExtractionOutcome::Success { record } => println!("{}", record.title),
//!     ExtractionOutcome::Failure { kind, partial, .. } => { /* degraded view */ }
//! }
//! ```

pub mod classify;
pub mod error;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod resilience;
pub mod strategies;
pub mod subtitles;

pub use classify::classify;
pub use error::{ErrorKind, ExtractError};
pub use models::{
    Engagement, ExtractedRecord, ExtractionOutcome, FeedPost, PartialRecord, Platform,
    ResourceIdentity, ResourceKind,
};
pub use orchestrator::Extractor;
pub use strategies::automation::{AutomationTuning, BrowserPage, BrowserProvider};
pub use strategies::generic::SelectorConfig;
pub use subtitles::SubtitleConfig;
