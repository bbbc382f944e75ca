mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use common::wait_until;
use effects_camera::{
    config::{Config, EncoderKind},
    filters::{FilterChain, FilterRegistry},
    output::{encoder_factory, DirectoryLibrary},
    pipeline::{
        FinalizeStatus, FramePipeline, MediaLibrary, PreviewMailbox, PreviewRenderer,
        RecorderSettings, RecordingController,
    },
    video::{drive_source, types::FrameSize, TestPatternSource},
};
use tempfile::tempdir;

fn small_config(work: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.capture.size = FrameSize::new(32, 24);
    config.capture.queue_depth = 32;
    config.pipeline.output_size = FrameSize::new(24, 32);
    config.pipeline.filter_threads = 2;
    config.recording.encoder = EncoderKind::ImageSequence;
    config.recording.queue_depth = 32;
    config.recording.output_dir = work.join("in-progress");
    config.recording.library_dir = Some(work.join("library"));
    config
}

#[test]
fn test_sepia_recording_lands_in_library() {
    let work = tempdir().unwrap();
    let config = small_config(work.path());
    config.validate().unwrap();

    let chain = FilterChain::from_config(&FilterRegistry::new(), &config).unwrap();
    let library_dir = config.recording.library_dir.clone().unwrap();
    let recorder = RecordingController::new(
        RecorderSettings::from_config(&config.recording, config.pipeline.output_size),
        encoder_factory(&config.recording),
        Some(Arc::new(DirectoryLibrary::new(&library_dir)) as Arc<dyn MediaLibrary>),
    );
    let mailbox = Arc::new(PreviewMailbox::new());
    let (pipeline, input) = FramePipeline::spawn(
        Arc::new(chain),
        mailbox.clone(),
        recorder.clone(),
        config.capture.queue_depth,
    )
    .unwrap();

    recorder.start_recording().unwrap();

    let mut source = TestPatternSource::new(config.capture.size, Duration::from_millis(33)).with_limit(10);
    let sent = drive_source(&mut source, &input, None, false, &AtomicBool::new(false)).unwrap();
    assert_eq!(sent, 10);
    assert!(wait_until(Duration::from_secs(10), || pipeline.stats().recorded == 10));

    let outcome = recorder.stop_recording().unwrap().wait();
    let output = match &outcome.status {
        FinalizeStatus::Completed(output) => output.clone(),
        other => panic!("recording did not complete: {:?}", other),
    };
    assert_eq!(output.frames, 10);
    assert_eq!(output.duration, Duration::from_millis(330));

    let saved = outcome.saved_to.expect("recording saved to library");
    assert_eq!(saved.parent(), Some(library_dir.as_path()));
    assert!(!output.path.exists());

    let mut frames: Vec<_> = std::fs::read_dir(&saved)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    frames.sort();
    assert_eq!(frames.len(), 10);

    let first = image::open(&frames[0]).unwrap().to_rgb8();
    assert_eq!(first.dimensions(), (24, 32));
    // Sepia output: red >= green >= blue everywhere
    assert!(first.pixels().all(|p| p.0[0] >= p.0[1] && p.0[1] >= p.0[2]));

    drop(input);
    let stats = pipeline.join();
    assert_eq!(stats.received, 10);

    let preview = mailbox.take().expect("a frame waiting in the preview");
    let surface = PreviewRenderer::new(config.pipeline.preview_rect).render(&preview);
    assert_eq!(surface.dimensions(), (360, 640));
}

#[test]
fn test_frames_outside_session_are_not_recorded() {
    let work = tempdir().unwrap();
    let config = small_config(work.path());

    let chain = FilterChain::from_config(&FilterRegistry::new(), &config).unwrap();
    let recorder = RecordingController::new(
        RecorderSettings::from_config(&config.recording, config.pipeline.output_size),
        encoder_factory(&config.recording),
        None,
    );
    let (pipeline, input) = FramePipeline::spawn(
        Arc::new(chain),
        Arc::new(PreviewMailbox::new()),
        recorder.clone(),
        config.capture.queue_depth,
    )
    .unwrap();

    let stop = AtomicBool::new(false);
    let mut source = TestPatternSource::new(config.capture.size, Duration::from_millis(10)).with_limit(15);

    let routed = |n: u64| {
        let stats = pipeline.stats();
        stats.previewed + stats.preview_skipped == n
    };

    drive_source(&mut source, &input, Some(5), false, &stop).unwrap();
    assert!(wait_until(Duration::from_secs(10), || routed(5)));

    recorder.start_recording().unwrap();
    drive_source(&mut source, &input, Some(5), false, &stop).unwrap();
    assert!(wait_until(Duration::from_secs(10), || routed(10)));

    let outcome = recorder.stop_recording().unwrap().wait();
    drive_source(&mut source, &input, None, false, &stop).unwrap();
    drop(input);
    let stats = pipeline.join();

    assert_eq!(stats.received, 15);
    assert_eq!(outcome.stats.origin, Some(Duration::from_millis(50)));
    let output = outcome.status.output().unwrap();
    assert_eq!(output.frames, 5);

    let recorded = std::fs::read_dir(&output.path).unwrap().count();
    assert_eq!(recorded, 5);
}
