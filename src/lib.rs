//! Montage is a layer-based media collage engine.
//!
//! Compositions place video and image layers on a shared canvas in normalized
//! coordinates. The same composition drives two paths:
//!
//! - interactive preview: [`compose_frame`] with [`RenderProfile::interactive`] plus a
//!   [`PlaybackSynchronizer`] for transport and audio gain
//! - frame-exact MP4 export: an [`ExportSession`] renders every output frame with
//!   [`RenderProfile::export`] and streams them into a [`FrameSink`]
#![forbid(unsafe_code)]

mod foundation;

/// CPU frame compositor.
pub mod compose;
/// Frame sinks (ffmpeg MP4, in-memory).
pub mod encode;
/// Export timeline assembly and the export session.
pub mod export;
/// Frame buffers and per-layer pixel sources.
pub mod media;
/// Composition data model.
pub mod model;
/// Preview playback transport.
pub mod playback;
/// Normalized-to-pixel layer mapping.
pub mod transform;

pub use crate::foundation::core::{
    FrameIndex, FrameRange, Fps, PixelSize, Point, Rect, Size, Vec2,
};
pub use crate::foundation::error::{MontageError, MontageResult};

pub use crate::compose::{ComposeRequest, RenderProfile, compose_frame};
pub use crate::encode::{
    AudioInputConfig, FfmpegSink, FfmpegSinkOpts, FrameSink, InMemorySink, SinkConfig,
};
pub use crate::export::{
    CancelToken, ExportHandle, ExportOutcome, ExportSession, ExportState, build_timeline,
};
pub use crate::media::{LayerSource, PixelFrame, SourceStore, StillImageSource};
pub use crate::model::composition::{AspectRatio, Composition, MAX_COMPOSITION_SECS};
pub use crate::model::layer::{LayerId, LayerTiming, MediaLayer};
pub use crate::model::media::{MediaId, MediaItem, MediaKind, MediaLibrary};
pub use crate::model::settings::{AppDefaults, ExportSettings, ResolutionTier};
pub use crate::playback::{GainSink, LayerSample, PlaybackSynchronizer};
pub use crate::transform::{FitMode, FitTransform, LayerFrame, fit_transform, pixel_frame};
