use rayon::prelude::*;

use crate::{
    error::{FilterError, Result},
    filters::traits::{mix, FilterMetadata},
    filters::{Filter, FilterConfig},
    video::types::Frame,
};

pub const RADIUS: &str = "radius";
pub const SOFTNESS: &str = "softness";

/// Radial darkening towards the frame corners
pub struct VignetteFilter;

impl VignetteFilter {
    pub fn new() -> Self {
        Self
    }

    /// 0.0 inside `radius`, 1.0 beyond `radius + softness`, smooth in between
    fn falloff(distance: f32, radius: f32, softness: f32) -> f32 {
        let t = ((distance - radius) / softness.max(f32::EPSILON)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

impl Default for VignetteFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for VignetteFilter {
    fn name(&self) -> &str {
        "vignette"
    }

    fn description(&self) -> &str {
        "Darkened corners with a soft radial falloff"
    }

    fn apply(&self, frame: &Frame, config: &FilterConfig) -> Result<Option<Frame>> {
        if frame.is_empty() {
            return Ok(None);
        }

        let radius = config.get_f32_or(RADIUS, 0.6);
        let softness = config.get_f32_or(SOFTNESS, 0.4);
        let intensity = config.intensity;

        let width = frame.width();
        let cx = width as f32 / 2.0;
        let cy = frame.height() as f32 / 2.0;
        let half_diagonal = (cx * cx + cy * cy).sqrt();

        let mut output = frame.as_image().clone();
        output
            .par_chunks_mut(width as usize * 3)
            .enumerate()
            .for_each(|(y, row)| {
                let dy = y as f32 + 0.5 - cy;
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let dx = x as f32 + 0.5 - cx;
                    let distance = (dx * dx + dy * dy).sqrt() / half_diagonal;
                    let shade = 1.0 - Self::falloff(distance, radius, softness);
                    for c in px.iter_mut() {
                        *c = mix(*c, *c as f32 * shade, intensity);
                    }
                }
            });

        Ok(Some(frame.with_image(output)))
    }

    fn default_config(&self) -> FilterConfig {
        FilterConfig::with_intensity(0.8)
            .set(RADIUS, 0.6)
            .set(SOFTNESS, 0.4)
    }

    fn validate_config(&self, config: &FilterConfig) -> Result<()> {
        let radius = config.get_f32_or(RADIUS, 0.6);
        if !(0.0..=1.0).contains(&radius) {
            return Err(FilterError::InvalidConfig {
                details: format!("vignette radius must be within 0.0-1.0, got {}", radius),
            }.into());
        }
        if config.get_f32_or(SOFTNESS, 0.4) < 0.0 {
            return Err(FilterError::InvalidConfig {
                details: "vignette softness must not be negative".to_string(),
            }.into());
        }
        Ok(())
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.3,
            optional_parameters: vec![
                (RADIUS.to_string(), "Untouched centre radius, fraction of half-diagonal (0.0-1.0)".to_string()),
                (SOFTNESS.to_string(), "Width of the falloff band".to_string()),
            ],
        }
    }
}
