//! # Filter System
//!
//! Photographic filters applied to every captured frame. A filter is a pure,
//! stateless mapping from one frame to another; its parameters come from an
//! immutable [`FilterConfig`] shared by reference across frames.
//!
//! ## Built-in Filters
//!
//! - **none**: passthrough
//! - **monochrome**: luminance mapped onto a tint colour
//! - **sepia**: monochrome with a warm brown tint
//! - **vignette**: darkened corners
//! - **invert**: colour negative
//!
//! ## Usage
//!
//! ```rust,no_run
//! use effects_camera::config::Config;
//! use effects_camera::filters::{FilterChain, FilterRegistry, FrameTransform};
//!
//! let registry = FilterRegistry::new();
//! let chain = FilterChain::from_config(&registry, &Config::default())?;
//! // chain.transform(frame) on the frame timeline
//! # Ok::<(), effects_camera::CameraError>(())
//! ```

pub mod registry;
pub mod traits;
pub mod transform;

// Filter implementations
pub mod basic;
pub mod monochrome;
pub mod vignette;

pub use registry::FilterRegistry;
pub use traits::{ConfigValue, Filter, FilterConfig, FilterMetadata};
pub use transform::{FilterChain, FrameTransform};

pub use basic::{InvertFilter, PassthroughFilter};
pub use monochrome::MonochromeFilter;
pub use vignette::VignetteFilter;
