use rayon::prelude::*;

use crate::{
    error::Result,
    filters::traits::{mix, FilterMetadata},
    filters::{Filter, FilterConfig},
    video::types::Frame,
};

use super::{COLOR_B, COLOR_G, COLOR_R, GREY_TINT, SEPIA_TINT};

/// Rec. 709 luma weights
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Luminance-to-tint filter
pub struct MonochromeFilter {
    name: &'static str,
    description: &'static str,
    tint: [f32; 3],
}

impl MonochromeFilter {
    /// Grey monochrome
    pub fn new() -> Self {
        Self {
            name: "monochrome",
            description: "Single-colour monochrome with configurable tint",
            tint: GREY_TINT,
        }
    }

    /// Warm sepia preset
    pub fn sepia() -> Self {
        Self {
            name: "sepia",
            description: "Warm sepia-toned monochrome",
            tint: SEPIA_TINT,
        }
    }

    fn tint_from(&self, config: &FilterConfig) -> [f32; 3] {
        [
            config.get_f32_or(COLOR_R, self.tint[0]).clamp(0.0, 1.0),
            config.get_f32_or(COLOR_G, self.tint[1]).clamp(0.0, 1.0),
            config.get_f32_or(COLOR_B, self.tint[2]).clamp(0.0, 1.0),
        ]
    }
}

impl Default for MonochromeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for MonochromeFilter {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn apply(&self, frame: &Frame, config: &FilterConfig) -> Result<Option<Frame>> {
        if frame.is_empty() {
            return Ok(None);
        }

        let tint = self.tint_from(config);
        let intensity = config.intensity;
        let row_len = frame.width() as usize * 3;

        let mut output = frame.as_image().clone();
        output.par_chunks_mut(row_len).for_each(|row| {
            for px in row.chunks_exact_mut(3) {
                let luma = (px[0] as f32 * LUMA[0] + px[1] as f32 * LUMA[1] + px[2] as f32 * LUMA[2]) / 255.0;
                for c in 0..3 {
                    px[c] = mix(px[c], luma * tint[c] * 255.0, intensity);
                }
            }
        });

        Ok(Some(frame.with_image(output)))
    }

    fn default_config(&self) -> FilterConfig {
        FilterConfig::with_intensity(1.0)
            .set(COLOR_R, self.tint[0])
            .set(COLOR_G, self.tint[1])
            .set(COLOR_B, self.tint[2])
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.2,
            optional_parameters: vec![
                (COLOR_R.to_string(), "Tint red channel (0.0-1.0)".to_string()),
                (COLOR_G.to_string(), "Tint green channel (0.0-1.0)".to_string()),
                (COLOR_B.to_string(), "Tint blue channel (0.0-1.0)".to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::FrameSize;
    use std::time::Duration;

    fn frame(color: [u8; 3]) -> Frame {
        Frame::new_filled(FrameSize::new(8, 4), color, Duration::from_millis(5), Duration::from_millis(33))
    }

    #[test]
    fn test_grey_monochrome_equalizes_channels() {
        let filter = MonochromeFilter::new();
        let out = filter
            .apply(&frame([200, 40, 90]), &FilterConfig::with_intensity(1.0))
            .unwrap()
            .unwrap();

        let [r, g, b] = out.get_pixel(3, 2);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(out.pts(), Duration::from_millis(5));
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let filter = MonochromeFilter::sepia();
        let input = frame([12, 34, 56]);
        let out = filter.apply(&input, &FilterConfig::with_intensity(0.0)).unwrap().unwrap();
        assert_eq!(out.as_rgb_bytes(), input.as_rgb_bytes());
    }

    #[test]
    fn test_sepia_white_takes_tint() {
        let filter = MonochromeFilter::sepia();
        let config = filter.default_config();
        let out = filter.apply(&frame([255, 255, 255]), &config).unwrap().unwrap();

        let [r, g, b] = out.get_pixel(0, 0);
        assert_eq!(r, 255);
        assert!(r > g && g > b);
    }

    #[test]
    fn test_input_frame_untouched() {
        let filter = MonochromeFilter::new();
        let input = frame([255, 0, 0]);
        let _ = filter.apply(&input, &FilterConfig::default()).unwrap();
        assert_eq!(input.get_pixel(0, 0), [255, 0, 0]);
    }
}
