//! Frame sinks: where composed frames go.

pub mod ffmpeg;
pub mod sink;

pub use ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
