use smallvec::SmallVec;
use tracing::warn;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::frame::PixelFrame;
use crate::media::store::SourceStore;
use crate::model::composition::Composition;
use crate::transform::{FitMode, FitTransform, LayerFrame, fit_transform, pixel_frame};

/// How the compositor treats sources and aspect mismatches.
///
/// Interactive preview favors continuing over stopping: a failing source costs one
/// layer, not the frame. Export favors correctness: the same failure aborts the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderProfile {
    /// How source aspect mismatches map into layer frames.
    pub fit_mode: FitMode,
    /// Whether a source decode failure fails the whole frame.
    pub strict_sources: bool,
}

impl RenderProfile {
    /// Preview profile: letterbox mismatches, tolerate failing sources.
    pub fn interactive() -> Self {
        Self {
            fit_mode: FitMode::Fit,
            strict_sources: false,
        }
    }

    /// Export profile: crop-to-fill mismatches, fail on source errors.
    pub fn export() -> Self {
        Self {
            fit_mode: FitMode::Fill,
            strict_sources: true,
        }
    }
}

/// One frame's worth of composition input.
#[derive(Clone, Copy, Debug)]
pub struct ComposeRequest<'a> {
    /// The document to render. Callers hand the compositor a settled snapshot.
    pub composition: &'a Composition,
    /// Output surface size in pixels.
    pub canvas: PixelSize,
    /// Time on the output timeline, in seconds.
    pub time_secs: f64,
    /// Profile governing fit mode and failure policy.
    pub profile: RenderProfile,
}

struct DrawItem {
    frame: PixelFrame,
    layer_frame: LayerFrame,
    fit: FitTransform,
    opacity: f32,
}

/// Compose one output frame.
///
/// The surface is filled with the composition's background color (alpha forced
/// opaque), then layers are drawn back-to-front in z order (ties keep insertion
/// order), each mapped from output time to its own source time. A layer with no
/// frame at that time is skipped in both profiles; a layer whose source errors is
/// skipped with a warning interactively and aborts the frame on export.
pub fn compose_frame(
    req: &ComposeRequest<'_>,
    store: &mut SourceStore,
) -> MontageResult<PixelFrame> {
    let mut items: SmallVec<[DrawItem; 8]> = SmallVec::new();

    for layer in req.composition.layers_by_z() {
        let Some(source_time) = layer.timing.source_time_secs(req.time_secs) else {
            continue;
        };

        let frame = match store
            .source_mut(layer.media)
            .and_then(|s| s.frame_at(source_time))
        {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                if req.profile.strict_sources {
                    return Err(MontageError::render(format!(
                        "layer {} source failed at t={:.3}s: {e}",
                        layer.id.0, req.time_secs
                    )));
                }
                warn!(layer = layer.id.0, error = %e, "skipping layer after source failure");
                continue;
            }
        };

        let layer_frame = pixel_frame(layer, req.canvas);
        let fit = fit_transform(frame.size(), &layer_frame, req.profile.fit_mode);
        items.push(DrawItem {
            frame,
            layer_frame,
            fit,
            opacity: layer.opacity as f32,
        });
    }

    let mut surface = vec![0u8; req.canvas.area() * 4];
    let bg_rgba = req.composition.background;
    let bg = [bg_rgba[0], bg_rgba[1], bg_rgba[2], 255];
    for px in surface.chunks_exact_mut(4) {
        px.copy_from_slice(&bg);
    }

    for item in &items {
        crate::compose::raster::draw_layer(
            &mut surface,
            req.canvas,
            &item.frame,
            &item.layer_frame,
            &item.fit,
            item.opacity,
        )?;
    }

    PixelFrame::from_premul_rgba8(req.canvas, surface)
}
