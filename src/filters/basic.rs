use rayon::prelude::*;

use crate::{
    error::Result,
    filters::traits::{mix, FilterMetadata},
    filters::{Filter, FilterConfig},
    video::types::Frame,
};

/// Passes frames through unchanged
pub struct PassthroughFilter;

impl Filter for PassthroughFilter {
    fn name(&self) -> &str {
        "none"
    }

    fn description(&self) -> &str {
        "No filter"
    }

    fn apply(&self, frame: &Frame, _config: &FilterConfig) -> Result<Option<Frame>> {
        Ok(Some(frame.clone()))
    }
}

/// Colour negative
pub struct InvertFilter;

impl Filter for InvertFilter {
    fn name(&self) -> &str {
        "invert"
    }

    fn description(&self) -> &str {
        "Colour negative, blended by intensity"
    }

    fn apply(&self, frame: &Frame, config: &FilterConfig) -> Result<Option<Frame>> {
        if frame.is_empty() {
            return Ok(None);
        }

        let intensity = config.intensity;
        let mut output = frame.as_image().clone();
        output
            .par_chunks_mut(frame.width() as usize * 3)
            .for_each(|row| {
                for c in row.iter_mut() {
                    *c = mix(*c, 255.0 - *c as f32, intensity);
                }
            });

        Ok(Some(frame.with_image(output)))
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.1,
            ..FilterMetadata::default()
        }
    }
}
