//! Decoding and mixing of export audio tracks into one interleaved PCM buffer.

use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use crate::export::timeline::AudioTrack;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::ffmpeg::{AudioPcm, MIX_SAMPLE_RATE, decode_audio_f32_stereo};

/// A decoded track ready to mix.
pub struct DecodedTrack {
    pub track: AudioTrack,
    pub pcm: AudioPcm,
}

/// Decode every track's audio stream (in parallel) at the mix sample rate.
pub fn decode_tracks(tracks: &[AudioTrack]) -> MontageResult<Vec<DecodedTrack>> {
    tracks
        .par_iter()
        .map(|track| {
            let pcm = decode_audio_f32_stereo(&track.source_path, MIX_SAMPLE_RATE)?;
            Ok(DecodedTrack {
                track: track.clone(),
                pcm,
            })
        })
        .collect()
}

/// Mix decoded tracks into `total_secs` of interleaved stereo f32 PCM.
///
/// Each track starts at timeline 0, reads its source range through its playback rate
/// with linear interpolation, applies its volume ramp, and sums into the output.
/// The sum is clamped to `[-1, 1]`.
pub fn mix_tracks(decoded: &[DecodedTrack], total_secs: f64) -> Vec<f32> {
    let total_samples = (total_secs.max(0.0) * f64::from(MIX_SAMPLE_RATE)).round() as usize;
    let mut out = vec![0.0f32; total_samples * 2];

    for d in decoded {
        mix_one(&mut out, d);
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

fn mix_one(out: &mut [f32], d: &DecodedTrack) {
    let channels = usize::from(d.pcm.channels.max(1));
    let src = d.pcm.interleaved_f32.as_slice();
    let src_frames = src.len() / channels;
    if src_frames == 0 {
        return;
    }

    let total_samples = out.len() / 2;
    for dst_sample in 0..total_samples {
        let t = dst_sample as f64 / f64::from(MIX_SAMPLE_RATE);
        let src_sec = d.track.source_start_secs + t * d.track.rate;
        if src_sec >= d.track.source_end_secs {
            break;
        }

        let src_pos = src_sec * f64::from(d.pcm.sample_rate);
        if !src_pos.is_finite() || src_pos < 0.0 {
            break;
        }
        let f0 = src_pos.floor() as usize;
        if f0 >= src_frames {
            break;
        }
        let f1 = (f0 + 1).min(src_frames - 1);
        let frac = (src_pos - f0 as f64) as f32;

        let gain = d.track.ramp.gain_at(t) as f32;
        let (l, r) = if channels == 1 {
            let v = src[f0] + (src[f1] - src[f0]) * frac;
            (v, v)
        } else {
            let i0 = f0 * channels;
            let i1 = f1 * channels;
            (
                src[i0] + (src[i1] - src[i0]) * frac,
                src[i0 + 1] + (src[i1 + 1] - src[i0 + 1]) * frac,
            )
        };

        let idx = dst_sample * 2;
        out[idx] += l * gain;
        out[idx + 1] += r * gain;
    }
}

/// Write interleaved f32 samples to a raw little-endian `.f32le` file.
pub fn write_mix_to_f32le_file(samples: &[f32], out_path: &Path) -> MontageResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MontageError::render(format!(
                "failed to create audio mix output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples.len() * 4);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    debug!(path = %out_path.display(), bytes = bytes.len(), "writing audio mix");
    std::fs::write(out_path, bytes).map_err(|e| {
        MontageError::render(format!(
            "failed to write mixed audio file '{}': {e}",
            out_path.display()
        ))
    })
}
