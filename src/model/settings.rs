use crate::foundation::core::{Fps, PixelSize};
use crate::model::composition::AspectRatio;

/// Output resolution tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// 720-class output.
    Standard,
    /// 1080-class output.
    #[default]
    High,
}

/// Export configuration: a pure value with no lifecycle of its own.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExportSettings {
    /// Output resolution tier.
    pub tier: ResolutionTier,
    /// Output frame rate.
    pub fps: Fps,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            tier: ResolutionTier::High,
            fps: Fps { num: 30, den: 1 },
            overwrite: true,
        }
    }
}

impl ExportSettings {
    /// Target pixel size for `aspect` at this tier.
    ///
    /// All entries are even in both dimensions (required for yuv420p MP4 output).
    pub fn pixel_size(&self, aspect: AspectRatio) -> PixelSize {
        let (w, h) = match (self.tier, aspect) {
            (ResolutionTier::High, AspectRatio::Portrait916) => (1080, 1920),
            (ResolutionTier::High, AspectRatio::Landscape169) => (1920, 1080),
            (ResolutionTier::High, AspectRatio::Square) => (1080, 1080),
            (ResolutionTier::High, AspectRatio::FourFive) => (1080, 1350),
            (ResolutionTier::Standard, AspectRatio::Portrait916) => (720, 1280),
            (ResolutionTier::Standard, AspectRatio::Landscape169) => (1280, 720),
            (ResolutionTier::Standard, AspectRatio::Square) => (720, 720),
            (ResolutionTier::Standard, AspectRatio::FourFive) => (720, 900),
        };
        PixelSize {
            width: w,
            height: h,
        }
    }
}

/// Creation-time defaults supplied by the settings collaborator.
///
/// Consumed only when layers or compositions are created, never mid-render.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct AppDefaults {
    /// Default on-canvas lifetime for new image layers, in seconds.
    pub image_duration_secs: f64,
    /// Default canvas aspect ratio for new compositions.
    pub aspect: AspectRatio,
    /// Default preview loop flag for new compositions.
    pub looping: bool,
}

impl Default for AppDefaults {
    fn default() -> Self {
        Self {
            image_duration_secs: 3.0,
            aspect: AspectRatio::Portrait916,
            looping: true,
        }
    }
}
