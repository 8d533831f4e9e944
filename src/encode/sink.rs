use std::path::PathBuf;

use crate::foundation::core::{FrameIndex, Fps};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::frame::PixelFrame;

/// Configuration provided to a [`FrameSink`] at the start of an export.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Optional external raw PCM audio file input.
    pub audio: Option<AudioInputConfig>,
}

impl SinkConfig {
    /// Check the invariants every sink relies on: a non-zero frame rate, non-zero
    /// even dimensions (yuv420p output needs both components divisible by 2), and
    /// non-zero audio parameters when audio is present.
    pub fn validate(&self) -> MontageResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(MontageError::validation("sink fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(MontageError::validation(
                "sink width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(MontageError::validation(
                "sink width/height must be even for yuv420p mp4 output",
            ));
        }
        if let Some(audio) = self.audio.as_ref() {
            if audio.sample_rate == 0 {
                return Err(MontageError::validation(
                    "audio sample_rate must be non-zero when audio is enabled",
                ));
            }
            if audio.channels == 0 {
                return Err(MontageError::validation(
                    "audio channels must be non-zero when audio is enabled",
                ));
            }
        }
        Ok(())
    }
}

/// Raw PCM audio input for sinks that support audio encoding.
#[derive(Debug, Clone)]
pub struct AudioInputConfig {
    /// Path to interleaved `f32le` PCM data.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

/// Sink contract for consuming composed frames in timeline order.
///
/// `push_frame` is called in strictly increasing [`FrameIndex`] order. Exactly one of
/// `end` or `abort` finishes a started sink: `end` finalizes the artifact, `abort`
/// discards it (cancellation path) and must leave no partial output behind.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> MontageResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &PixelFrame) -> MontageResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> MontageResult<()>;
    /// Stop early and remove any partial output.
    fn abort(&mut self) -> MontageResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, PixelFrame)>,
    aborted: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    /// The captured frames, in push order.
    pub fn frames(&self) -> &[(FrameIndex, PixelFrame)] {
        &self.frames
    }

    /// Whether `abort` was called.
    pub fn was_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> MontageResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &PixelFrame) -> MontageResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> MontageResult<()> {
        Ok(())
    }

    fn abort(&mut self) -> MontageResult<()> {
        self.frames.clear();
        self.aborted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32) -> SinkConfig {
        SinkConfig {
            width,
            height,
            fps: Fps { num: 30, den: 1 },
            audio: None,
        }
    }

    #[test]
    fn validate_requires_even_nonzero_dimensions() {
        assert!(cfg(720, 720).validate().is_ok());
        assert!(cfg(0, 720).validate().is_err());
        assert!(cfg(720, 0).validate().is_err());
        assert!(cfg(721, 720).validate().is_err());
        assert!(cfg(720, 721).validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_fps() {
        let mut c = cfg(720, 720);
        c.fps = Fps { num: 0, den: 1 };
        assert!(c.validate().is_err());
        c.fps = Fps { num: 30, den: 0 };
        assert!(c.validate().is_err());
    }

    fn audio(sample_rate: u32, channels: u16) -> AudioInputConfig {
        AudioInputConfig {
            path: PathBuf::from("/tmp/mix.f32le"),
            sample_rate,
            channels,
        }
    }

    #[test]
    fn validate_checks_audio_parameters() {
        let mut c = cfg(720, 720);
        c.audio = Some(audio(44_100, 2));
        assert!(c.validate().is_ok());

        c.audio = Some(audio(0, 2));
        assert!(c.validate().is_err());

        c.audio = Some(audio(44_100, 0));
        assert!(c.validate().is_err());
    }

    #[test]
    fn in_memory_sink_rejects_invalid_config() {
        let mut sink = InMemorySink::new();
        assert!(sink.begin(cfg(0, 0)).is_err());
        assert!(sink.config().is_none());
        assert!(sink.begin(cfg(720, 720)).is_ok());
    }
}
