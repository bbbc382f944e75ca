//! # Monochrome Filter
//!
//! Maps each pixel's luminance onto a single tint colour and blends the result
//! with the input by the configured intensity. With a warm tint this is the
//! classic sepia camera look.

mod effect;

pub use effect::MonochromeFilter;

// Monochrome-specific parameter constants (tint channels, 0.0-1.0)
pub const COLOR_R: &str = "color_r";
pub const COLOR_G: &str = "color_g";
pub const COLOR_B: &str = "color_b";

/// Neutral grey tint
pub const GREY_TINT: [f32; 3] = [1.0, 1.0, 1.0];

/// Warm brown tint used by the `sepia` preset
///
/// A conventional sepia brown. Tints are clamped to 0..=1, so over-unity
/// colours that push a channel past white have no exact equivalent here.
pub const SEPIA_TINT: [f32; 3] = [1.0, 0.82, 0.57];
