use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::debug;

use crate::model::composition::Composition;
use crate::model::layer::{LayerId, LayerTiming};
use crate::model::media::MediaLibrary;
use crate::playback::clock::LayerClock;

/// Immediate audio gain application, implemented by the host's audio output.
///
/// Volume changes bypass the clocks entirely: the synchronizer forwards them here the
/// moment they arrive so muting never restarts or perturbs playback.
pub trait GainSink: Send {
    /// Apply `gain` in `[0, 1]` to the audio of `layer` now.
    fn set_gain(&mut self, layer: LayerId, gain: f64);
}

/// A no-op sink for compositions without audio output.
pub struct NullGainSink;

impl GainSink for NullGainSink {
    fn set_gain(&mut self, _layer: LayerId, _gain: f64) {}
}

/// One layer's current position on its source timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerSample {
    pub layer: LayerId,
    pub source_time_secs: f64,
}

/// Shared transport over per-layer clocks.
///
/// All video layers follow one play/pause/seek transport; each layer maps transport
/// time through its own [`LayerClock`]. The current instant is always injected so
/// tests drive time deterministically.
pub struct PlaybackSynchronizer {
    clocks: BTreeMap<LayerId, LayerClock>,
    failed: BTreeSet<LayerId>,
    looping: bool,
    playing: bool,
    position_secs: f64,
    anchor: Option<Instant>,
    gain: Box<dyn GainSink>,
}

impl PlaybackSynchronizer {
    /// Build a synchronizer over the video layers of `composition`.
    ///
    /// Image layers need no clock; their lifetime is handled by the compositor's
    /// time mapping. Each video layer's current volume is pushed to the gain sink up
    /// front so audio starts at the right level.
    pub fn new(
        composition: &Composition,
        library: &MediaLibrary,
        mut gain: Box<dyn GainSink>,
    ) -> Self {
        let mut clocks = BTreeMap::new();
        for layer in composition.layers() {
            if let LayerTiming::Video {
                start_offset,
                rate,
                volume,
            } = layer.timing
            {
                let duration = library
                    .get(layer.media)
                    .and_then(|item| item.source_duration_secs())
                    .unwrap_or(0.0);
                clocks.insert(layer.id, LayerClock::new(start_offset, rate, duration));
                gain.set_gain(layer.id, volume);
            }
        }
        Self {
            clocks,
            failed: BTreeSet::new(),
            looping: composition.looping,
            playing: false,
            position_secs: 0.0,
            anchor: None,
            gain,
        }
    }

    /// Start the transport at `now`. A no-op while already playing.
    pub fn play(&mut self, now: Instant) {
        if !self.playing {
            self.playing = true;
            self.anchor = Some(now);
            debug!(position = self.position_secs, "transport play");
        }
    }

    /// Stop the transport at `now`, keeping the position.
    pub fn pause(&mut self, now: Instant) {
        if self.playing {
            self.position_secs = self.transport_secs(now);
            self.playing = false;
            self.anchor = None;
            debug!(position = self.position_secs, "transport pause");
        }
    }

    /// Jump the transport to `t` seconds. Playback state is preserved.
    pub fn seek(&mut self, t: f64, now: Instant) {
        self.position_secs = t.max(0.0);
        if self.playing {
            self.anchor = Some(now);
        }
    }

    /// Change the loop behavior for subsequent samples.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether the transport is running.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Transport position at `now`, in seconds.
    pub fn transport_secs(&self, now: Instant) -> f64 {
        match (self.playing, self.anchor) {
            (true, Some(anchor)) => {
                self.position_secs + now.saturating_duration_since(anchor).as_secs_f64()
            }
            _ => self.position_secs,
        }
    }

    /// Apply an audio gain change immediately. Clocks are untouched.
    pub fn set_volume(&mut self, layer: LayerId, gain: f64) {
        self.gain.set_gain(layer, gain.clamp(0.0, 1.0));
    }

    /// Exclude a layer whose media failed to load from all future samples.
    pub fn mark_failed(&mut self, layer: LayerId) {
        self.failed.insert(layer);
    }

    /// Each live layer's source time at `now`, in layer-id order.
    pub fn sample(&self, now: Instant) -> Vec<LayerSample> {
        let t = self.transport_secs(now);
        self.clocks
            .iter()
            .filter(|(id, _)| !self.failed.contains(id))
            .map(|(id, clock)| LayerSample {
                layer: *id,
                source_time_secs: clock.source_time(t, self.looping),
            })
            .collect()
    }
}
