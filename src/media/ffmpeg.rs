//! Probing and decoding of file-backed media via the ffmpeg CLI tools.
//!
//! Everything here shells out to `ffprobe`/`ffmpeg` and is gated behind the
//! `media-ffmpeg` feature; without it the functions return a media error so the
//! rest of the engine stays testable with in-memory sources.

use std::path::{Path, PathBuf};

use crate::foundation::error::MontageResult;

#[cfg(not(feature = "media-ffmpeg"))]
use crate::foundation::error::MontageError;

/// Sample rate all audio is resampled to before mixing.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Probe result for a file-backed video source.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_secs: f64,
    pub has_audio: bool,
}

/// Interleaved f32 PCM decoded from a source's audio stream.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// An empty stereo buffer at `sample_rate`.
    pub fn silent(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            interleaved_f32: Vec::new(),
        }
    }
}

#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> MontageResult<VideoSourceInfo> {
    use crate::foundation::error::MontageError;

    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| MontageError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(MontageError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| MontageError::media(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MontageError::media("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| MontageError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| MontageError::media("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| MontageError::media("invalid video r_frame_rate"))?;
    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_secs,
        has_audio,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &Path) -> MontageResult<VideoSourceInfo> {
    Err(MontageError::media(
        "file-backed media requires the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
pub fn decode_video_frame_rgba8(
    source: &VideoSourceInfo,
    source_time_secs: f64,
) -> MontageResult<Option<Vec<u8>>> {
    use crate::foundation::error::MontageError;

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{source_time_secs:.9}")])
        .arg("-i")
        .arg(&source.source_path)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .output()
        .map_err(|e| MontageError::media(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(MontageError::media(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = source.width as usize * source.height as usize * 4;
    if expected_len == 0 {
        return Err(MontageError::media(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    // Seeking past the end yields no output rather than an error.
    if out.stdout.is_empty() {
        return Ok(None);
    }
    if out.stdout.len() < expected_len {
        return Err(MontageError::media(format!(
            "decoded video frame has invalid size: got {} bytes, expected {expected_len}",
            out.stdout.len()
        )));
    }
    Ok(Some(out.stdout[..expected_len].to_vec()))
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frame_rgba8(
    _source: &VideoSourceInfo,
    _source_time_secs: f64,
) -> MontageResult<Option<Vec<u8>>> {
    Err(MontageError::media(
        "file-backed media requires the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> MontageResult<AudioPcm> {
    use crate::foundation::error::MontageError;

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| MontageError::media(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // ffmpeg reports a missing audio stream as an error. Treat it as silence.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(AudioPcm::silent(sample_rate));
        }
        return Err(MontageError::media(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(MontageError::media(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: pcm,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_audio_f32_stereo(_path: &Path, _sample_rate: u32) -> MontageResult<AudioPcm> {
    Err(MontageError::media(
        "file-backed media requires the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}
