//! Demo binary: extract one URL and print the outcome as JSON.
//!
//! The engine itself lives in the library; this binary wires up tracing,
//! parses the CLI, runs a single extraction, and pretty-prints the result.
//! No headless-browser provider is configured here, so client-rendered
//! platforms report `automation_unavailable`.

use clap::Parser;
use std::error::Error;
use tracing::{debug, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

use sourcegrab::{Extractor, Platform, SelectorConfig, SubtitleConfig};

mod cli;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let subtitles = if args.subtitle_tool.is_empty() {
        None
    } else {
        Some(SubtitleConfig {
            tool: args.subtitle_tool.clone(),
            primary_lang: args.subtitle_lang.clone(),
            ..Default::default()
        })
    };
    let extractor = Extractor::new()?.with_subtitles(subtitles);

    if args.listing {
        let config = match &args.config {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                Some(SelectorConfig::from_str(&raw)?)
            }
            None => None,
        };
        let records = extractor.extract_listing(&args.url, config.as_ref()).await?;
        info!(count = records.len(), "Listing extraction complete");
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let hint = match &args.platform {
        Some(raw) => Some(raw.parse::<Platform>()?),
        None => None,
    };
    let outcome = extractor.extract(&args.url, hint).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
