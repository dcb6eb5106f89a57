//! Command-line interface definitions for the sourcegrab binary.
//!
//! This module defines the CLI arguments and options using the `clap` crate.

use clap::Parser;

/// Command-line arguments for the sourcegrab demo binary.
///
/// # Examples
///
/// ```sh
/// # Single-resource extraction
/// sourcegrab https://youtu.be/dKw3x9WgXcQ
///
/// # A microblog post with an explicit platform hint
/// sourcegrab --platform microblog https://x.com/alice/status/123
///
/// # Multi-article listing extraction with a custom selector config
/// sourcegrab --listing --config selectors.yaml https://example.com/blog
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The URL to extract
    pub url: String,

    /// Platform hint: video, microblog, federated, or generic
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Extract an article listing instead of a single resource
    #[arg(short, long)]
    pub listing: bool,

    /// Path to a YAML/JSON selector config for listing extraction
    #[arg(short, long)]
    pub config: Option<String>,

    /// Subtitle tool binary (empty string disables subtitle retrieval)
    #[arg(long, env = "SOURCEGRAB_SUBTITLE_TOOL", default_value = "yt-dlp")]
    pub subtitle_tool: String,

    /// Preferred caption language
    #[arg(long, default_value = "en")]
    pub subtitle_lang: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["sourcegrab", "https://example.com/blog"]);
        assert_eq!(cli.url, "https://example.com/blog");
        assert!(!cli.listing);
        assert_eq!(cli.subtitle_tool, "yt-dlp");
    }

    #[test]
    fn test_cli_listing_flags() {
        let cli = Cli::parse_from([
            "sourcegrab",
            "--listing",
            "--config",
            "selectors.yaml",
            "https://example.com/blog",
        ]);
        assert!(cli.listing);
        assert_eq!(cli.config.as_deref(), Some("selectors.yaml"));
    }

    #[test]
    fn test_cli_platform_hint() {
        let cli = Cli::parse_from([
            "sourcegrab",
            "-p",
            "microblog",
            "https://x.com/alice/status/123",
        ]);
        assert_eq!(cli.platform.as_deref(), Some("microblog"));
    }
}
