use std::sync::Arc;

use image::imageops::{self, FilterType};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{FilterError, Result},
    filters::{Filter, FilterConfig, FilterRegistry},
    video::types::{Frame, FrameSize, Rotation},
};

/// Maps one input frame to at most one output frame
///
/// Runs on the frame timeline only. `None` means "no output this tick": the
/// frame is dropped from every sink and nothing is reported as an error.
pub trait FrameTransform: Send + Sync {
    fn transform(&self, frame: Frame) -> Option<Frame>;
}

impl<F> FrameTransform for F
where
    F: Fn(Frame) -> Option<Frame> + Send + Sync,
{
    fn transform(&self, frame: Frame) -> Option<Frame> {
        self(frame)
    }
}

/// Rotation, filter, then fit to the output size
///
/// The filter and its parameters are immutable and shared; nothing is cloned
/// per frame.
pub struct FilterChain {
    filter: Arc<dyn Filter>,
    config: Arc<FilterConfig>,
    rotation: Rotation,
    output_size: FrameSize,
    pool: rayon::ThreadPool,
}

impl FilterChain {
    pub fn new(
        filter: Arc<dyn Filter>,
        config: FilterConfig,
        rotation: Rotation,
        output_size: FrameSize,
        threads: usize,
    ) -> Result<Self> {
        let config = config.merged_over(&filter.default_config());
        filter.validate_config(&config)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("filter-{}", i))
            .build()
            .map_err(|e| FilterError::Failed {
                filter: filter.name().to_string(),
                reason: format!("Failed to start filter workers: {}", e),
            })?;

        Ok(Self {
            filter,
            config: Arc::new(config),
            rotation,
            output_size,
            pool,
        })
    }

    /// Build the chain described by `config`, resolving the filter by name
    pub fn from_config(registry: &FilterRegistry, config: &Config) -> Result<Self> {
        let filter = registry.require(&config.filter.name)?;
        info!(
            "Filter chain: rotate {:?} -> {} (intensity {:.2}) -> fit {}",
            config.capture.rotation,
            filter.name(),
            config.filter.config.intensity,
            config.pipeline.output_size
        );

        Self::new(
            filter,
            config.filter.config.clone(),
            config.capture.rotation,
            config.pipeline.output_size,
            config.pipeline.filter_threads,
        )
    }

    pub fn filter_name(&self) -> &str {
        self.filter.name()
    }

    pub fn output_size(&self) -> FrameSize {
        self.output_size
    }

    fn rotate(&self, frame: Frame) -> Frame {
        match self.rotation {
            Rotation::None => frame,
            Rotation::Clockwise90 => frame.with_image(imageops::rotate90(frame.as_image())),
            Rotation::Rotate180 => frame.with_image(imageops::rotate180(frame.as_image())),
            Rotation::CounterClockwise90 => frame.with_image(imageops::rotate270(frame.as_image())),
        }
    }

    fn fit(&self, frame: Frame) -> Frame {
        if frame.size() == self.output_size {
            return frame;
        }

        let resized = imageops::resize(
            frame.as_image(),
            self.output_size.width,
            self.output_size.height,
            FilterType::Triangle,
        );
        frame.with_image(resized)
    }
}

impl FrameTransform for FilterChain {
    fn transform(&self, frame: Frame) -> Option<Frame> {
        if frame.is_empty() {
            debug!("Empty frame at {:?} has no output", frame.pts());
            return None;
        }

        let rotated = self.rotate(frame);
        let filtered = self
            .pool
            .install(|| self.filter.apply(&rotated, &self.config));

        match filtered {
            Ok(Some(frame)) => Some(self.fit(frame)),
            Ok(None) => {
                debug!("{} produced no output for frame at {:?}", self.filter.name(), rotated.pts());
                None
            }
            Err(e) => {
                warn!("{} failed on frame at {:?}: {}", self.filter.name(), rotated.pts(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CameraError;
    use crate::filters::{PassthroughFilter, VignetteFilter};
    use std::time::Duration;

    fn input(size: FrameSize) -> Frame {
        Frame::new_filled(size, [90, 120, 150], Duration::from_millis(100), Duration::from_millis(33))
    }

    #[test]
    fn test_rotate_and_fit() {
        let chain = FilterChain::new(
            Arc::new(PassthroughFilter),
            FilterConfig::default(),
            Rotation::Clockwise90,
            FrameSize::new(24, 32),
            1,
        )
        .unwrap();

        let out = chain.transform(input(FrameSize::new(64, 48))).unwrap();
        assert_eq!(out.size(), FrameSize::new(24, 32));
        assert_eq!(out.pts(), Duration::from_millis(100));
        assert_eq!(out.duration(), Duration::from_millis(33));
    }

    #[test]
    fn test_matching_size_is_not_resampled() {
        let chain = FilterChain::new(
            Arc::new(PassthroughFilter),
            FilterConfig::default(),
            Rotation::None,
            FrameSize::new(16, 16),
            1,
        )
        .unwrap();

        let frame = input(FrameSize::new(16, 16));
        let out = chain.transform(frame.clone()).unwrap();
        assert!(std::ptr::eq(frame.as_image(), out.as_image()));
    }

    #[test]
    fn test_empty_frame_has_no_output() {
        let chain = FilterChain::from_config(&FilterRegistry::new(), &Config::default()).unwrap();
        assert!(chain.transform(input(FrameSize::new(0, 0))).is_none());
    }

    #[test]
    fn test_invalid_filter_config_rejected_at_build() {
        let result = FilterChain::new(
            Arc::new(VignetteFilter::new()),
            FilterConfig::default().set("radius", -1.0),
            Rotation::None,
            FrameSize::new(8, 8),
            1,
        );
        assert!(matches!(result, Err(CameraError::Filter(FilterError::InvalidConfig { .. }))));
    }

    #[test]
    fn test_closure_transform() {
        let drop_odd = |frame: Frame| (frame.pts().as_secs() % 2 == 0).then_some(frame);
        let size = FrameSize::new(2, 2);
        let at = |s| Frame::new_filled(size, [0, 0, 0], Duration::from_secs(s), Duration::ZERO);

        assert!(drop_odd.transform(at(2)).is_some());
        assert!(drop_odd.transform(at(3)).is_none());
    }
}
