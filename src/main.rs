use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbImage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use effects_camera::{
    config::{Config, EncoderKind},
    filters::{FilterChain, FilterRegistry},
    output::{encoder_factory, DirectoryLibrary, FfmpegEncoderFactory},
    pipeline::{
        FinalizeHandle, FinalizeStatus, FramePipeline, MediaLibrary, PreviewMailbox,
        PreviewRenderer, RecorderSettings, RecordingController, StartOutcome,
    },
    video::{drive_source, FrameSource, ImageSequenceSource, TestPatternSource},
};

#[derive(Parser)]
#[command(
    name = "effects-camera",
    version,
    about = "Real-time camera filter pipeline with preview and recording",
    long_about = "Effects-Camera runs frames from a camera stand-in through a photographic filter, keeps a live preview and records the filtered stream while recording is held."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Filter to apply (none, monochrome, sepia, vignette, invert)
    #[arg(short, long)]
    filter: Option<String>,

    /// Filter intensity (0.0 - 1.0)
    #[arg(short, long)]
    intensity: Option<f32>,

    /// Frame source: "test-pattern" or a directory of images
    #[arg(short, long, default_value = "test-pattern")]
    source: String,

    /// Number of frames to capture
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Press record at this many seconds into the capture
    #[arg(long)]
    record_from: Option<f64>,

    /// Release record at this many seconds into the capture
    #[arg(long)]
    record_until: Option<f64>,

    /// Directory for in-progress recordings
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write the last preview surface to this PNG
    #[arg(short, long)]
    preview_out: Option<PathBuf>,

    /// List available filters and exit
    #[arg(long)]
    list_filters: bool,

    /// Write the default configuration to this file and exit
    #[arg(long)]
    write_default_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Scripted record button: press and release in seconds of capture time
#[derive(Debug, Clone, Copy)]
struct RecordSchedule {
    from: Option<Duration>,
    until: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_thread_names(true)
        .init();

    if let Some(path) = &cli.write_default_config {
        Config::default().save_to_file(path)?;
        info!("Default configuration written to {:?}", path);
        return Ok(());
    }

    let registry = FilterRegistry::new();
    if cli.list_filters {
        for name in registry.available_filters() {
            if let Some(filter) = registry.get_filter(&name) {
                let metadata = filter.metadata();
                println!("{:<12} {} (cost {:.1})", name, filter.description(), metadata.performance_impact);
                for (parameter, help) in &metadata.optional_parameters {
                    println!("{:<12}   {:<10} {}", "", parameter, help);
                }
            }
        }
        return Ok(());
    }

    info!("Starting Effects-Camera v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let schedule = RecordSchedule {
        from: seconds(cli.record_from, "--record-from")?,
        until: seconds(cli.record_until, "--record-until")?,
    };

    let frames = cli.frames.unwrap_or_else(|| {
        let seconds = schedule
            .until
            .or(schedule.from)
            .map_or(5.0, |at| at.as_secs_f64() + 1.0);
        (seconds * config.capture.fps).ceil() as u64
    });

    let chain = FilterChain::from_config(&registry, &config).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if config.recording.encoder == EncoderKind::Ffmpeg
        && !FfmpegEncoderFactory::from_config(&config.recording).is_available()
    {
        warn!(
            "'{}' not found; recordings will fail. Install FFmpeg or set recording.encoder = \"image_sequence\"",
            config.recording.ffmpeg_path
        );
    }

    let library = config
        .recording
        .library_dir
        .as_ref()
        .map(|dir| Arc::new(DirectoryLibrary::new(dir)) as Arc<dyn MediaLibrary>);
    let recorder = RecordingController::new(
        RecorderSettings::from_config(&config.recording, config.pipeline.output_size),
        encoder_factory(&config.recording),
        library,
    );

    let mailbox = Arc::new(PreviewMailbox::new());
    let (pipeline, input) = FramePipeline::spawn(
        Arc::new(chain),
        mailbox.clone(),
        recorder.clone(),
        config.capture.queue_depth,
    )?;

    // UI side of the preview
    let renderer = PreviewRenderer::new(config.pipeline.preview_rect);
    let ui_mailbox = Arc::clone(&mailbox);
    let preview_task = tokio::spawn(async move {
        let mut last: Option<RgbImage> = None;
        while let Some(frame) = ui_mailbox.next().await {
            last = Some(renderer.render(&frame));
        }
        last
    });

    let mut source = open_source(&cli.source, &config, frames)?;
    let stop = Arc::new(AtomicBool::new(false));
    let source_stop = Arc::clone(&stop);
    let source_input = input.clone();
    let mut source_task = tokio::task::spawn_blocking(move || {
        drive_source(source.as_mut(), &source_input, Some(frames), true, &source_stop)
    });

    let control = tokio::spawn(run_schedule(recorder.clone(), schedule));

    info!("Capturing {} frames from {}", frames, cli.source);
    let captured = tokio::select! {
        result = &mut source_task => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            stop.store(true, Ordering::Relaxed);
            source_task.await?
        }
    };
    match captured {
        Ok(count) => info!("Source delivered {} frames", count),
        Err(e) => error!("Frame source failed: {}", e.user_message()),
    }

    // Release record if the schedule has not
    control.abort();
    let mut pending: Vec<FinalizeHandle> = control.await.ok().flatten().into_iter().collect();
    pending.extend(recorder.stop_recording());

    drop(input);
    let stats = tokio::task::spawn_blocking(move || pipeline.join()).await?;

    for handle in pending {
        let outcome = handle.outcome().await;
        match &outcome.status {
            FinalizeStatus::Completed(output) => info!(
                "Session {}: {} frames ({:.2}s) at {}",
                outcome.session_id,
                output.frames,
                output.duration.as_secs_f64(),
                outcome.saved_to.as_ref().unwrap_or(&output.path).display()
            ),
            FinalizeStatus::Cancelled => info!("Session {}: nothing recorded", outcome.session_id),
            FinalizeStatus::Failed(e) => error!("Session {}: {}", outcome.session_id, e),
        }
        info!("Session {} stats: {:?}", outcome.session_id, outcome.stats);
    }

    mailbox.close();
    if let Some(surface) = preview_task.await? {
        if let Some(path) = &cli.preview_out {
            surface
                .save(path)
                .with_context(|| format!("Failed to write preview to {:?}", path))?;
            info!("Preview written to {:?}", path);
        }
    }

    info!(
        "Pipeline stats: {:?} (preview presented {}, skipped {})",
        stats,
        mailbox.presented(),
        mailbox.skipped()
    );
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if let Some(filter) = &cli.filter {
        config.filter.name = filter.clone();
    }
    if let Some(intensity) = cli.intensity {
        config.filter.config.intensity = intensity;
    }
    if let Some(dir) = &cli.output_dir {
        config.recording.output_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn seconds(value: Option<f64>, flag: &str) -> Result<Option<Duration>> {
    value
        .map(|secs| {
            Duration::try_from_secs_f64(secs).with_context(|| format!("{} must be a non-negative number of seconds", flag))
        })
        .transpose()
}

fn open_source(source: &str, config: &Config, frames: u64) -> Result<Box<dyn FrameSource>> {
    let frame_duration = config.capture.frame_duration();
    if source == "test-pattern" {
        return Ok(Box::new(
            TestPatternSource::new(config.capture.size, frame_duration)
                .with_limit(frames)
                .with_noise(rand::random(), 6),
        ));
    }

    let images = ImageSequenceSource::open(source, frame_duration)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(Box::new(images.looped()))
}

async fn run_schedule(recorder: RecordingController, schedule: RecordSchedule) -> Option<FinalizeHandle> {
    let started = tokio::time::Instant::now();

    if let Some(from) = schedule.from {
        tokio::time::sleep_until(started + from).await;
        match recorder.start_recording() {
            Ok(StartOutcome::Started { session_id, destination }) => {
                info!("Record pressed: session {} -> {}", session_id, destination.display())
            }
            Ok(StartOutcome::AlreadyRecording(phase)) => info!("Record pressed while {}", phase),
            // Already logged by the controller
            Err(_) => return None,
        }
    }

    let until = schedule.until?;
    tokio::time::sleep_until(started + until).await;
    info!("Record released");
    recorder.stop_recording()
}
