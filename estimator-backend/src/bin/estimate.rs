//! Room estimate from photos on disk
//!
//! **Usage:**
//! ```bash
//! estimate kitchen-1.jpg kitchen-2.jpg [--claimed-area 12.5] [--config analyzer.json]
//! ```
//!
//! Writes the per-photo analyses and the fused room estimate to stdout as
//! JSON. Logs go to stderr.

use anyhow::Context;
use clap::Parser;
use inference_client::InferenceClient;
use room_estimator::analyzer::summarize_batch;
use room_estimator::{AnalyzerConfig, Collaborators, RoomAnalyzer};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[clap(name = "estimate")]
#[clap(about = "Estimate room dimensions from one or more photos of the same room")]
struct Args {
    /// Photos of the room (JPEG or PNG)
    #[clap(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Floor area the room is claimed to have, in m²
    #[clap(long, value_name = "M2")]
    claimed_area: Option<f64>,

    /// Analyzer config JSON; falls back to ESTIMATOR_CONFIG, then defaults
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip the inference sidecar (room-type defaults and sheet calibration only)
    #[clap(long)]
    offline: bool,

    /// Compact instead of pretty JSON
    #[clap(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalyzerConfig::from_json_file(path),
        None => AnalyzerConfig::from_env(),
    }
    .context("Failed to load analyzer config")?;

    let collaborators = if args.offline {
        warn!("Running offline: no detection, depth, segmentation or scene models");
        Collaborators::unavailable()
    } else {
        InferenceClient::from_env()?.into_collaborators()
    };

    let analyzer = RoomAnalyzer::new(collaborators, config)?;

    info!("Analyzing {} photos", args.images.len());
    let analyses = analyzer.analyze_paths(&args.images).await;
    let reconstruction = summarize_batch(analyses, args.claimed_area)?;

    let json = if args.compact {
        serde_json::to_string(&reconstruction)?
    } else {
        serde_json::to_string_pretty(&reconstruction)?
    };
    println!("{}", json);

    Ok(())
}
