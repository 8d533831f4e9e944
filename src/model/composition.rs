use kurbo::{Point, Vec2};

use crate::foundation::error::{MontageError, MontageResult};
use crate::model::layer::{LayerId, LayerTiming, MediaLayer};
use crate::model::media::{MediaId, MediaKind, MediaLibrary};

/// Hard ceiling on composition duration, in seconds.
pub const MAX_COMPOSITION_SECS: f64 = 90.0;

/// Canvas aspect ratio of a composition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16 portrait.
    #[default]
    Portrait916,
    /// 16:9 landscape.
    Landscape169,
    /// 1:1 square.
    Square,
    /// 4:5 portrait.
    FourFive,
}

impl AspectRatio {
    /// Width over height.
    pub fn ratio(self) -> f64 {
        match self {
            Self::Portrait916 => 9.0 / 16.0,
            Self::Landscape169 => 16.0 / 9.0,
            Self::Square => 1.0,
            Self::FourFive => 4.0 / 5.0,
        }
    }
}

/// Mutable timeline document: an ordered set of layers over a shared canvas.
///
/// The composition owns layers but not media; layers reference [`MediaLibrary`]
/// entries by id and the pairing is re-checked by [`Composition::validate`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Composition {
    /// Canvas aspect ratio.
    pub aspect: AspectRatio,
    /// Whether interactive preview loops back to the start when playback reaches the end.
    pub looping: bool,
    /// Whether editing gestures snap placements to a layout grid. Advisory for the
    /// editing surface; the engine never reads it.
    pub snap_to_grid: bool,
    /// Canvas background color (alpha is ignored; the canvas is always opaque).
    pub background: [u8; 4],
    layers: Vec<MediaLayer>,
    next_layer_id: u64,
}

impl Composition {
    /// Create an empty composition.
    pub fn new(aspect: AspectRatio, looping: bool) -> Self {
        Self {
            aspect,
            looping,
            snap_to_grid: false,
            background: [0, 0, 0, 255],
            layers: Vec::new(),
            next_layer_id: 1,
        }
    }

    /// Add a layer referencing `media`, assigning a fresh id and the next-highest z-index.
    ///
    /// `timing` must match the item's kind; callers typically build it from
    /// [`LayerTiming::video_default`] or [`LayerTiming::image`].
    pub fn add_layer(
        &mut self,
        library: &MediaLibrary,
        media: MediaId,
        position: Point,
        size: Vec2,
        timing: LayerTiming,
    ) -> MontageResult<LayerId> {
        let item = library
            .get(media)
            .ok_or_else(|| MontageError::validation(format!("unknown media id {}", media.0)))?;
        let id = LayerId(self.next_layer_id);
        let layer = MediaLayer {
            id,
            media,
            position,
            size,
            z_index: self.top_z().map_or(0, |z| z.saturating_add(1)),
            opacity: 1.0,
            timing,
        };
        layer.validate_against(item)?;
        self.next_layer_id += 1;
        self.layers.push(layer);
        Ok(id)
    }

    /// Remove a layer by id.
    pub fn remove_layer(&mut self, id: LayerId) -> MontageResult<()> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| MontageError::validation(format!("unknown layer id {}", id.0)))?;
        self.layers.remove(idx);
        Ok(())
    }

    /// Look up a layer by id.
    pub fn layer(&self, id: LayerId) -> Option<&MediaLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Mutable lookup by id.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut MediaLayer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// All layers in insertion order.
    pub fn layers(&self) -> &[MediaLayer] {
        &self.layers
    }

    /// Layers sorted back-to-front by z-index; ties keep insertion order.
    pub fn layers_by_z(&self) -> Vec<&MediaLayer> {
        let mut sorted: Vec<&MediaLayer> = self.layers.iter().collect();
        sorted.sort_by_key(|l| l.z_index);
        sorted
    }

    /// Move a layer above every other layer.
    pub fn bring_to_front(&mut self, id: LayerId) -> MontageResult<()> {
        let z = self.top_z().map_or(0, |z| z.saturating_add(1));
        let layer = self
            .layer_mut(id)
            .ok_or_else(|| MontageError::validation(format!("unknown layer id {}", id.0)))?;
        layer.z_index = z;
        Ok(())
    }

    /// Move a layer below every other layer.
    pub fn send_to_back(&mut self, id: LayerId) -> MontageResult<()> {
        let z = self
            .layers
            .iter()
            .map(|l| l.z_index)
            .min()
            .map_or(0, |z| z.saturating_sub(1));
        let layer = self
            .layer_mut(id)
            .ok_or_else(|| MontageError::validation(format!("unknown layer id {}", id.0)))?;
        layer.z_index = z;
        Ok(())
    }

    /// Timeline duration in seconds: the longest effective layer duration, capped at
    /// [`MAX_COMPOSITION_SECS`]. Zero when the composition has no layers.
    pub fn effective_duration_secs(&self, library: &MediaLibrary) -> f64 {
        self.layers
            .iter()
            .filter_map(|l| library.get(l.media).map(|item| l.effective_duration_secs(item)))
            .fold(0.0, f64::max)
            .min(MAX_COMPOSITION_SECS)
    }

    /// Check every layer against the library: each id must resolve and each
    /// layer's invariants must hold against its item.
    pub fn validate(&self, library: &MediaLibrary) -> MontageResult<()> {
        for layer in &self.layers {
            let item = library.get(layer.media).ok_or_else(|| {
                MontageError::validation(format!(
                    "layer {} references unknown media id {}",
                    layer.id.0, layer.media.0
                ))
            })?;
            layer.validate_against(item)?;
        }
        Ok(())
    }

    /// Whether any layer references a video item that carries audio.
    pub fn has_audio(&self, library: &MediaLibrary) -> bool {
        self.layers.iter().any(|l| {
            matches!(l.timing, LayerTiming::Video { .. })
                && library
                    .get(l.media)
                    .is_some_and(|item| item.kind == MediaKind::Video && item.has_audio)
        })
    }

    /// Immutable copy of the document for handoff to a render or export session.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    fn top_z(&self) -> Option<i32> {
        self.layers.iter().map(|l| l.z_index).max()
    }
}
