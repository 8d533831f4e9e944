use std::collections::BTreeMap;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{MontageError, MontageResult};

/// Stable identifier of an imported media asset.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct MediaId(pub u64);

/// Content kind of an imported media asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Time-varying video content, possibly with an audio stream.
    Video,
    /// A static still image.
    Image,
}

/// Intrinsic playback duration keyed by media kind.
///
/// Images have no intrinsic duration; their on-canvas lifetime is a per-layer property
/// ([`crate::model::layer::LayerTiming::Image`]).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaDuration {
    /// Source duration in seconds.
    Video {
        /// Seconds, >= 0.
        secs: f64,
    },
    /// No intrinsic duration.
    Image,
}

/// An imported source asset: immutable after import, referenced by id from layers.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MediaItem {
    /// Unique id assigned at import time.
    pub id: MediaId,
    /// Content kind.
    pub kind: MediaKind,
    /// Native pixel dimensions.
    pub pixel_size: PixelSize,
    /// Intrinsic duration, present for videos only.
    pub duration: MediaDuration,
    /// Whether the source carries an audio stream (videos only; always false for images).
    pub has_audio: bool,
    /// Filesystem path for file-backed sources. In-memory sources carry `None`;
    /// audio export needs the path to reach the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<std::path::PathBuf>,
}

impl MediaItem {
    /// Create a video item with a validated source duration.
    pub fn video(
        id: MediaId,
        pixel_size: PixelSize,
        duration_secs: f64,
        has_audio: bool,
    ) -> MontageResult<Self> {
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(MontageError::validation(
                "video duration must be finite and >= 0",
            ));
        }
        Ok(Self {
            id,
            kind: MediaKind::Video,
            pixel_size,
            duration: MediaDuration::Video {
                secs: duration_secs,
            },
            has_audio,
            source_path: None,
        })
    }

    /// Attach the filesystem path backing this item.
    pub fn with_source_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Create a still-image item.
    pub fn image(id: MediaId, pixel_size: PixelSize) -> Self {
        Self {
            id,
            kind: MediaKind::Image,
            pixel_size,
            duration: MediaDuration::Image,
            has_audio: false,
            source_path: None,
        }
    }

    /// Source duration in seconds for videos, `None` for images.
    pub fn source_duration_secs(&self) -> Option<f64> {
        match self.duration {
            MediaDuration::Video { secs } => Some(secs),
            MediaDuration::Image => None,
        }
    }

    /// Check the kind/duration pairing invariant.
    pub fn validate(&self) -> MontageResult<()> {
        match (self.kind, &self.duration) {
            (MediaKind::Video, MediaDuration::Video { secs }) => {
                if !secs.is_finite() || *secs < 0.0 {
                    return Err(MontageError::validation(
                        "video duration must be finite and >= 0",
                    ));
                }
            }
            (MediaKind::Image, MediaDuration::Image) => {
                if self.has_audio {
                    return Err(MontageError::validation("image items cannot carry audio"));
                }
            }
            _ => {
                return Err(MontageError::validation(
                    "media kind and duration variant must agree",
                ));
            }
        }
        Ok(())
    }
}

/// In-memory registry of imported items, owned by the import collaborator.
///
/// Layers reference entries by [`MediaId`]; the registry never owns layers.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct MediaLibrary {
    items: BTreeMap<MediaId, MediaItem>,
}

impl MediaLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item, validating its invariants. Ids must be unique.
    pub fn insert(&mut self, item: MediaItem) -> MontageResult<()> {
        item.validate()?;
        if self.items.contains_key(&item.id) {
            return Err(MontageError::validation(format!(
                "duplicate media id {}",
                item.id.0
            )));
        }
        self.items.insert(item.id, item);
        Ok(())
    }

    /// Look up an item by id.
    pub fn get(&self, id: MediaId) -> Option<&MediaItem> {
        self.items.get(&id)
    }

    /// Iterate all registered items in id order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.values()
    }

    /// Number of registered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` when no items are registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_rejects_negative_duration() {
        assert!(
            MediaItem::video(MediaId(1), PixelSize::new(640, 480).unwrap(), -1.0, false).is_err()
        );
    }

    #[test]
    fn image_has_no_intrinsic_duration() {
        let item = MediaItem::image(MediaId(1), PixelSize::new(640, 480).unwrap());
        assert_eq!(item.source_duration_secs(), None);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn library_rejects_duplicate_ids() {
        let mut lib = MediaLibrary::new();
        let size = PixelSize::new(640, 480).unwrap();
        lib.insert(MediaItem::image(MediaId(7), size)).unwrap();
        assert!(lib.insert(MediaItem::image(MediaId(7), size)).is_err());
    }

    #[test]
    fn mismatched_kind_and_duration_is_invalid() {
        let mut item = MediaItem::image(MediaId(1), PixelSize::new(64, 64).unwrap());
        item.kind = MediaKind::Video;
        assert!(item.validate().is_err());
    }
}
