//! Frame buffers and per-layer pixel sources.

pub mod ffmpeg;
pub mod frame;
pub mod source;
pub mod store;

pub use frame::PixelFrame;
pub use source::{LayerSource, SolidColorSource, StillImageSource};
pub use store::SourceStore;

#[cfg(feature = "media-ffmpeg")]
pub use source::VideoFileSource;
