use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use effects_camera::{
    filters::{FilterChain, FilterConfig, FilterRegistry, FrameTransform},
    video::types::{Frame, Rotation},
};

/// Apply one filter to a still image
#[derive(Parser)]
#[command(name = "filter-still", version)]
struct Cli {
    /// Input image (PNG or JPEG)
    input: PathBuf,

    /// Output image
    output: PathBuf,

    /// Filter to apply
    #[arg(short, long, default_value = "sepia")]
    filter: String,

    /// Filter intensity (0.0 - 1.0)
    #[arg(short, long, default_value_t = 1.0)]
    intensity: f32,

    /// Rotate a quarter turn clockwise first, as the camera pipeline does
    #[arg(short, long)]
    rotate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let image = image::open(&cli.input)
        .with_context(|| format!("Failed to open {:?}", cli.input))?
        .to_rgb8();
    let frame = Frame::new(image, Duration::ZERO, Duration::ZERO);

    let registry = FilterRegistry::new();
    let filter = registry
        .get_filter(&cli.filter)
        .ok_or_else(|| anyhow::anyhow!("Unknown filter: {} (available: {})", cli.filter, registry.available_filters().join(", ")))?;

    let rotation = if cli.rotate { Rotation::Clockwise90 } else { Rotation::None };
    let output_size = rotation.apply_to_size(frame.size());
    let chain = FilterChain::new(
        Arc::clone(&filter),
        FilterConfig::with_intensity(cli.intensity),
        rotation,
        output_size,
        num_cpus::get(),
    )?;

    info!("Applying {} ({}) to {}", filter.name(), cli.intensity, frame.size());
    let filtered = chain
        .transform(frame)
        .ok_or_else(|| anyhow::anyhow!("{} produced no output for {:?}", cli.filter, cli.input))?;

    filtered
        .save_png(&cli.output)
        .with_context(|| format!("Failed to write {:?}", cli.output))?;
    info!("Wrote {:?}", cli.output);
    Ok(())
}
