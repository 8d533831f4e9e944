//! Shared-transport playback for interactive preview.

pub mod clock;
pub mod synchronizer;

pub use clock::LayerClock;
pub use synchronizer::{GainSink, LayerSample, PlaybackSynchronizer};
