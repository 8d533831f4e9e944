//! Pure transport-time to source-time mapping for one layer.

/// Per-layer clock parameters.
///
/// Maps a time on the shared transport to a time on the layer's own source timeline.
/// A value type with no hidden state: the synchronizer owns transport position, the
/// clock only does arithmetic, so tests can probe it directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerClock {
    /// Playback start offset into the source, in seconds.
    pub start_offset: f64,
    /// Playback rate multiplier, > 0.
    pub rate: f64,
    /// Source duration in seconds, > 0 for finite sources.
    pub source_duration: f64,
}

impl LayerClock {
    /// Create a clock from layer timing parameters.
    pub fn new(start_offset: f64, rate: f64, source_duration: f64) -> Self {
        Self {
            start_offset,
            rate,
            source_duration,
        }
    }

    /// Source time for transport time `t`.
    ///
    /// Without looping the mapping clamps to the last representable instant, so a
    /// finished layer holds its final frame. With looping it wraps modulo the source
    /// duration; each layer wraps on its own period, so layers of different lengths
    /// drift out of phase.
    pub fn source_time(&self, t: f64, looping: bool) -> f64 {
        let raw = self.start_offset + t.max(0.0) * self.rate;
        if self.source_duration <= 0.0 {
            return raw.max(0.0);
        }
        if looping {
            raw.rem_euclid(self.source_duration)
        } else {
            raw.min(self.source_duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_through_offset_and_rate() {
        let clock = LayerClock::new(1.0, 2.0, 100.0);
        assert_eq!(clock.source_time(0.0, false), 1.0);
        assert_eq!(clock.source_time(3.0, false), 7.0);
    }

    #[test]
    fn clamps_when_not_looping() {
        let clock = LayerClock::new(0.0, 1.0, 5.0);
        assert_eq!(clock.source_time(4.0, false), 4.0);
        assert_eq!(clock.source_time(9.0, false), 5.0);
    }

    #[test]
    fn wraps_when_looping() {
        let clock = LayerClock::new(0.0, 1.0, 5.0);
        assert_eq!(clock.source_time(4.0, true), 4.0);
        assert_eq!(clock.source_time(7.0, true), 2.0);
        assert_eq!(clock.source_time(12.5, true), 2.5);
    }

    #[test]
    fn negative_transport_time_is_treated_as_zero() {
        let clock = LayerClock::new(2.0, 1.0, 10.0);
        assert_eq!(clock.source_time(-3.0, false), 2.0);
    }
}
