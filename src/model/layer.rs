use kurbo::{Point, Vec2};

use crate::foundation::error::{MontageError, MontageResult};
use crate::model::media::{MediaId, MediaItem, MediaKind};

/// Stable identifier of a layer within a composition.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct LayerId(pub u64);

/// Shortest permitted on-canvas lifetime of an image layer, in seconds.
pub const IMAGE_DURATION_MIN_SECS: f64 = 0.5;
/// Longest permitted on-canvas lifetime of an image layer, in seconds.
pub const IMAGE_DURATION_MAX_SECS: f64 = 5.0;

/// Per-layer timing, a closed sum keyed by the referenced item's [`MediaKind`].
///
/// Exactly one variant is semantically active per layer; the pairing is checked by
/// [`MediaLayer::validate_against`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerTiming {
    /// Timing for a video layer.
    Video {
        /// Playback start offset into the source, in seconds.
        start_offset: f64,
        /// Playback rate multiplier (1.0 = native speed).
        rate: f64,
        /// Audio gain in `[0, 1]`.
        volume: f64,
    },
    /// Timing for an image layer.
    Image {
        /// On-canvas lifetime in seconds, within
        /// `[IMAGE_DURATION_MIN_SECS, IMAGE_DURATION_MAX_SECS]`.
        display_duration: f64,
    },
}

impl LayerTiming {
    /// Default video timing: native speed from the start, full volume.
    pub fn video_default() -> Self {
        Self::Video {
            start_offset: 0.0,
            rate: 1.0,
            volume: 1.0,
        }
    }

    /// Image timing with `display_duration` clamped into the permitted range.
    pub fn image(display_duration: f64) -> Self {
        Self::Image {
            display_duration: display_duration
                .clamp(IMAGE_DURATION_MIN_SECS, IMAGE_DURATION_MAX_SECS),
        }
    }

    /// Map a time on the output timeline to a time on the source's own timeline.
    ///
    /// Returns `None` when the layer is not on canvas at `output_secs`: before zero,
    /// or past an image's display duration. Video layers map through their start
    /// offset and playback rate; whether a frame still exists at the mapped time is
    /// the source's call.
    pub fn source_time_secs(&self, output_secs: f64) -> Option<f64> {
        if output_secs < 0.0 {
            return None;
        }
        match *self {
            Self::Video {
                start_offset, rate, ..
            } => Some(start_offset + output_secs * rate),
            Self::Image { display_duration } => {
                (output_secs < display_duration).then_some(0.0)
            }
        }
    }
}

/// One placement of a [`MediaItem`] on the canvas.
///
/// Position and size are normalized against the canvas. Position is deliberately unclamped:
/// layers may overflow the canvas edges, and the overflowing part is simply cropped by the
/// output surface at composite time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MediaLayer {
    /// Unique id within the owning composition.
    pub id: LayerId,
    /// Back-reference to the placed media item.
    pub media: MediaId,
    /// Normalized center position (unclamped).
    pub position: Point,
    /// Normalized size, both components > 0.
    pub size: Vec2,
    /// Back-to-front ordering; ties break by insertion order.
    pub z_index: i32,
    /// Uniform opacity in `[0, 1]`.
    pub opacity: f64,
    /// Kind-specific timing.
    pub timing: LayerTiming,
}

impl MediaLayer {
    /// Effective contribution of this layer to the composition duration, in seconds.
    ///
    /// Video layers contribute their source duration: neither the loop flag nor the playback
    /// rate extends or shortens the timeline. Image layers contribute their display duration.
    pub fn effective_duration_secs(&self, item: &MediaItem) -> f64 {
        match self.timing {
            LayerTiming::Video { .. } => item.source_duration_secs().unwrap_or(0.0),
            LayerTiming::Image { display_duration } => display_duration,
        }
    }

    /// Set the audio gain of a video layer.
    pub fn set_volume(&mut self, volume: f64) -> MontageResult<()> {
        match &mut self.timing {
            LayerTiming::Video { volume: v, .. } => {
                if !(0.0..=1.0).contains(&volume) {
                    return Err(MontageError::validation("layer volume must be in [0, 1]"));
                }
                *v = volume;
                Ok(())
            }
            LayerTiming::Image { .. } => Err(MontageError::validation(
                "volume is meaningless for image layers",
            )),
        }
    }

    /// Set the display duration of an image layer, clamped to the permitted range.
    pub fn set_display_duration(&mut self, secs: f64) -> MontageResult<()> {
        match &mut self.timing {
            LayerTiming::Image { display_duration } => {
                *display_duration = secs.clamp(IMAGE_DURATION_MIN_SECS, IMAGE_DURATION_MAX_SECS);
                Ok(())
            }
            LayerTiming::Video { .. } => Err(MontageError::validation(
                "display duration applies to image layers only",
            )),
        }
    }

    /// Check layer invariants against the referenced item.
    pub fn validate_against(&self, item: &MediaItem) -> MontageResult<()> {
        if self.media != item.id {
            return Err(MontageError::validation("layer validated against wrong item"));
        }
        if !(self.size.x > 0.0 && self.size.y > 0.0) {
            return Err(MontageError::validation(format!(
                "layer {} size components must be > 0",
                self.id.0
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(MontageError::validation(format!(
                "layer {} opacity must be in [0, 1]",
                self.id.0
            )));
        }
        match (item.kind, &self.timing) {
            (MediaKind::Video, LayerTiming::Video { rate, volume, start_offset }) => {
                if !rate.is_finite() || *rate <= 0.0 {
                    return Err(MontageError::validation(format!(
                        "layer {} playback rate must be > 0",
                        self.id.0
                    )));
                }
                if !(0.0..=1.0).contains(volume) {
                    return Err(MontageError::validation(format!(
                        "layer {} volume must be in [0, 1]",
                        self.id.0
                    )));
                }
                if !start_offset.is_finite() || *start_offset < 0.0 {
                    return Err(MontageError::validation(format!(
                        "layer {} start offset must be >= 0",
                        self.id.0
                    )));
                }
            }
            (MediaKind::Image, LayerTiming::Image { display_duration }) => {
                if !(IMAGE_DURATION_MIN_SECS..=IMAGE_DURATION_MAX_SECS).contains(display_duration)
                {
                    return Err(MontageError::validation(format!(
                        "layer {} display duration out of range",
                        self.id.0
                    )));
                }
            }
            _ => {
                return Err(MontageError::validation(format!(
                    "layer {} timing variant does not match media kind",
                    self.id.0
                )));
            }
        }
        Ok(())
    }
}
