//! Frame rendering
//!
//! Decodes validated frames and moves their pixels to the panel.

pub mod pipeline;
pub mod strip;

pub use pipeline::{RenderError, RenderPipeline, RenderStats};
pub use strip::{Strip, StripPlan};
