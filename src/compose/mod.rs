//! CPU frame compositor.

pub mod blend;
pub mod compositor;
pub mod raster;

pub use compositor::{ComposeRequest, RenderProfile, compose_frame};
