use crate::foundation::core::PixelSize;
use crate::foundation::error::MontageResult;
use crate::media::frame::PixelFrame;

/// Supplier of pixel frames for one layer.
///
/// `source_time_secs` is a time into the source's own timeline, already mapped from
/// output time by the caller. Returning `Ok(None)` means the source has no frame at
/// that time (for example, past the end of a non-looping video); the compositor then
/// skips the layer. Errors signal a decode failure and are handled per render
/// profile: skipped with a warning interactively, fatal during export.
pub trait LayerSource: Send {
    /// Native pixel dimensions of the source.
    fn pixel_size(&self) -> PixelSize;

    /// The frame at `source_time_secs`, or `None` when no frame exists there.
    fn frame_at(&mut self, source_time_secs: f64) -> MontageResult<Option<PixelFrame>>;
}

/// A still image decoded once at import; every sample returns the same frame.
pub struct StillImageSource {
    frame: PixelFrame,
}

impl StillImageSource {
    /// Decode an encoded image (PNG, JPEG, ...) into a premultiplied frame.
    pub fn from_encoded(bytes: &[u8]) -> MontageResult<Self> {
        use anyhow::Context;

        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let size = PixelSize::new(width, height)?;
        let frame = PixelFrame::from_straight_rgba8(size, rgba.into_raw())?;
        Ok(Self { frame })
    }

    /// Wrap an already-decoded frame.
    pub fn from_frame(frame: PixelFrame) -> Self {
        Self { frame }
    }
}

impl LayerSource for StillImageSource {
    fn pixel_size(&self) -> PixelSize {
        self.frame.size()
    }

    fn frame_at(&mut self, _source_time_secs: f64) -> MontageResult<Option<PixelFrame>> {
        Ok(Some(self.frame.clone()))
    }
}

/// A constant-color source. Stands in for media in tests and for placeholder layers.
pub struct SolidColorSource {
    frame: PixelFrame,
    duration_secs: Option<f64>,
}

impl SolidColorSource {
    /// A color frame available at every source time.
    pub fn new(size: PixelSize, rgba: [u8; 4]) -> Self {
        Self {
            frame: PixelFrame::solid(size, rgba),
            duration_secs: None,
        }
    }

    /// A color frame that runs out after `duration_secs`, like a finite video.
    pub fn with_duration(size: PixelSize, rgba: [u8; 4], duration_secs: f64) -> Self {
        Self {
            frame: PixelFrame::solid(size, rgba),
            duration_secs: Some(duration_secs),
        }
    }
}

impl LayerSource for SolidColorSource {
    fn pixel_size(&self) -> PixelSize {
        self.frame.size()
    }

    fn frame_at(&mut self, source_time_secs: f64) -> MontageResult<Option<PixelFrame>> {
        if source_time_secs < 0.0 {
            return Ok(None);
        }
        if let Some(d) = self.duration_secs
            && source_time_secs >= d
        {
            return Ok(None);
        }
        Ok(Some(self.frame.clone()))
    }
}

/// A file-backed video decoded on demand through ffmpeg.
///
/// Decoding a frame is expensive, so the most recent frame is kept and reused while
/// consecutive samples land on the same source frame.
#[cfg(feature = "media-ffmpeg")]
pub struct VideoFileSource {
    info: crate::media::ffmpeg::VideoSourceInfo,
    size: PixelSize,
    cached: Option<(i64, PixelFrame)>,
}

#[cfg(feature = "media-ffmpeg")]
impl VideoFileSource {
    /// Probe `path` and build a source from the result.
    pub fn open(path: &std::path::Path) -> MontageResult<Self> {
        let info = crate::media::ffmpeg::probe_video(path)?;
        let size = PixelSize::new(info.width, info.height)?;
        Ok(Self {
            info,
            size,
            cached: None,
        })
    }

    /// Probe metadata gathered at open time.
    pub fn info(&self) -> &crate::media::ffmpeg::VideoSourceInfo {
        &self.info
    }

    fn frame_key(&self, source_time_secs: f64) -> i64 {
        let fps = if self.info.fps_num == 0 || self.info.fps_den == 0 {
            30.0
        } else {
            f64::from(self.info.fps_num) / f64::from(self.info.fps_den)
        };
        (source_time_secs * fps).floor() as i64
    }
}

#[cfg(feature = "media-ffmpeg")]
impl LayerSource for VideoFileSource {
    fn pixel_size(&self) -> PixelSize {
        self.size
    }

    fn frame_at(&mut self, source_time_secs: f64) -> MontageResult<Option<PixelFrame>> {
        if source_time_secs < 0.0 || source_time_secs >= self.info.duration_secs {
            return Ok(None);
        }
        let key = self.frame_key(source_time_secs);
        if let Some((cached_key, frame)) = &self.cached
            && *cached_key == key
        {
            return Ok(Some(frame.clone()));
        }
        let Some(raw) =
            crate::media::ffmpeg::decode_video_frame_rgba8(&self.info, source_time_secs)?
        else {
            return Ok(None);
        };
        // ffmpeg rawvideo rgba output is straight alpha (opaque for typical video).
        let frame = PixelFrame::from_straight_rgba8(self.size, raw)?;
        self.cached = Some((key, frame.clone()));
        Ok(Some(frame))
    }
}
