//! Mapping from normalized layer placement to output pixels.

pub mod layer_frame;

pub use layer_frame::{FitMode, FitTransform, LayerFrame, fit_transform, pixel_frame};
