use std::collections::BTreeMap;

use crate::foundation::error::{MontageError, MontageResult};
use crate::media::source::LayerSource;
use crate::model::media::{MediaId, MediaItem, MediaLibrary};

/// Imported media plus the pixel source backing each item.
///
/// The library describes what was imported; the sources produce frames. The two are
/// kept in lockstep: registering an item without a source (or the reverse) is an error
/// surfaced at lookup time.
#[derive(Default)]
pub struct SourceStore {
    library: MediaLibrary,
    sources: BTreeMap<MediaId, Box<dyn LayerSource>>,
}

impl SourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item together with its pixel source.
    pub fn insert(&mut self, item: MediaItem, source: Box<dyn LayerSource>) -> MontageResult<()> {
        if source.pixel_size() != item.pixel_size {
            return Err(MontageError::validation(format!(
                "source dimensions do not match media item {}",
                item.id.0
            )));
        }
        let id = item.id;
        self.library.insert(item)?;
        self.sources.insert(id, source);
        Ok(())
    }

    /// The descriptive library.
    pub fn library(&self) -> &MediaLibrary {
        &self.library
    }

    /// The source backing `id`.
    pub fn source_mut(&mut self, id: MediaId) -> MontageResult<&mut (dyn LayerSource + 'static)> {
        self.sources
            .get_mut(&id)
            .map(|s| s.as_mut())
            .ok_or_else(|| MontageError::media(format!("no source registered for media id {}", id.0)))
    }
}
