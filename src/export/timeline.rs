use std::path::PathBuf;

use crate::foundation::error::MontageResult;
use crate::model::composition::{Composition, MAX_COMPOSITION_SECS};
use crate::model::layer::{LayerId, LayerTiming};
use crate::model::media::{MediaId, MediaLibrary};
use crate::model::settings::AppDefaults;

/// Time-keyed gain curve for one audio track.
///
/// Constant today; the keyed shape exists so fades can slot in without changing the
/// mixer contract.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeRamp {
    /// (time_secs, gain) points sorted by time. Gain holds between points.
    points: Vec<(f64, f64)>,
}

impl VolumeRamp {
    /// A ramp holding `gain` for the whole track.
    pub fn constant(gain: f64) -> Self {
        Self {
            points: vec![(0.0, gain.clamp(0.0, 1.0))],
        }
    }

    /// Build from explicit points; they are sorted by time.
    pub fn from_points(mut points: Vec<(f64, f64)>) -> Self {
        if points.is_empty() {
            return Self::constant(1.0);
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        for p in &mut points {
            p.1 = p.1.clamp(0.0, 1.0);
        }
        Self { points }
    }

    /// Gain at `t` seconds: the last point at or before `t` (step-hold).
    pub fn gain_at(&self, t: f64) -> f64 {
        let mut gain = self.points[0].1;
        for &(pt, pg) in &self.points {
            if pt <= t {
                gain = pg;
            } else {
                break;
            }
        }
        gain
    }
}

/// One video layer's contribution to the export render.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoTrack {
    pub layer: LayerId,
    pub media: MediaId,
    /// Source time at timeline 0.
    pub source_start_secs: f64,
    /// Exclusive end of the source range after duration capping.
    pub source_end_secs: f64,
    /// Playback rate multiplier.
    pub rate: f64,
}

impl VideoTrack {
    /// Track length on the output timeline, in seconds.
    pub fn timeline_secs(&self) -> f64 {
        if self.rate <= 0.0 {
            return 0.0;
        }
        (self.source_end_secs - self.source_start_secs).max(0.0) / self.rate
    }
}

/// One audio stream to decode, ramp, and mix.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    pub layer: LayerId,
    pub media: MediaId,
    /// File to decode the stream from.
    pub source_path: PathBuf,
    pub source_start_secs: f64,
    pub source_end_secs: f64,
    pub rate: f64,
    pub ramp: VolumeRamp,
}

/// The settled plan for one export run.
#[derive(Clone, Debug, Default)]
pub struct ExportTimeline {
    /// Output duration in seconds, already capped.
    pub total_secs: f64,
    pub video_tracks: Vec<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
}

/// Build the export plan from a composition snapshot.
///
/// Every video layer becomes a [`VideoTrack`] placed at timeline 0 with its source
/// range clipped to the composition duration cap. Video layers with audio and a
/// file-backed source also get an [`AudioTrack`] carrying the layer's volume as a
/// constant ramp. Image layers contribute no track; the compositor renders them
/// straight from their still content within their display window.
///
/// A layer-less composition still exports: a background-only video of the default
/// image duration.
pub fn build_timeline(
    composition: &Composition,
    library: &MediaLibrary,
    defaults: &AppDefaults,
) -> MontageResult<ExportTimeline> {
    composition.validate(library)?;

    let total_secs = if composition.layers().is_empty() {
        defaults.image_duration_secs
    } else {
        composition.effective_duration_secs(library)
    };

    let mut video_tracks = Vec::new();
    let mut audio_tracks = Vec::new();

    for layer in composition.layers() {
        let LayerTiming::Video {
            start_offset,
            rate,
            volume,
        } = layer.timing
        else {
            continue;
        };
        // validate() above guarantees the item exists.
        let Some(item) = library.get(layer.media) else {
            continue;
        };
        let source_duration = item.source_duration_secs().unwrap_or(0.0);
        let clipped = source_duration.min(MAX_COMPOSITION_SECS * rate.max(f64::MIN_POSITIVE));
        let clipped = clipped.min(source_duration);

        video_tracks.push(VideoTrack {
            layer: layer.id,
            media: layer.media,
            source_start_secs: start_offset,
            source_end_secs: start_offset + clipped,
            rate,
        });

        if item.has_audio
            && let Some(path) = item.source_path.as_ref()
        {
            audio_tracks.push(AudioTrack {
                layer: layer.id,
                media: layer.media,
                source_path: path.clone(),
                source_start_secs: start_offset,
                source_end_secs: start_offset + clipped,
                rate,
                ramp: VolumeRamp::constant(volume),
            });
        }
    }

    Ok(ExportTimeline {
        total_secs,
        video_tracks,
        audio_tracks,
    })
}
