//! Export assembly: timeline building, audio mixing, and the export session.

pub mod audio;
pub mod session;
pub mod timeline;

pub use session::{
    CancelToken, ExportHandle, ExportOutcome, ExportSession, ExportState, ProgressCallback,
};
pub use timeline::{AudioTrack, ExportTimeline, VideoTrack, VolumeRamp, build_timeline};
