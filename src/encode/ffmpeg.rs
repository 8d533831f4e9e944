use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::mul_div255_u16;
use crate::media::frame::PixelFrame;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Background color frames are flattened over before encoding (RGBA8).
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Sink that streams composed frames into a spawned system `ffmpeg`.
///
/// Frames arrive premultiplied; `ffmpeg` does not understand premul, so each frame
/// is flattened over `bg_rgba` into opaque RGBA8 before it is written. Audio, when
/// present in the [`SinkConfig`], is muxed from the raw PCM file the export session
/// prepared. `abort` kills the encoder and removes the partial artifact, matching
/// the session's cancellation contract; it is safe to call before `begin` and then
/// touches nothing on disk.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    encoder: Option<Encoder>,
    cfg: Option<SinkConfig>,
    scratch: Vec<u8>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            encoder: None,
            cfg: None,
            scratch: Vec::new(),
            last_idx: None,
        }
    }

    fn prepare_out_path(&self) -> MontageResult<()> {
        if let Some(parent) = self.opts.out_path.parent() {
            use anyhow::Context as _;
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(MontageError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> MontageResult<()> {
        cfg.validate()?;
        if self.encoder.is_some() {
            return Err(MontageError::render("ffmpeg sink already started"));
        }
        self.prepare_out_path()?;
        if !is_ffmpeg_on_path() {
            return Err(MontageError::render(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        info!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            audio = cfg.audio.is_some(),
            "spawning ffmpeg encoder"
        );
        self.encoder = Some(Encoder::spawn(&encode_args(&cfg, &self.opts))?);
        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &PixelFrame) -> MontageResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MontageError::render("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(MontageError::render(format!(
                "frame {} pushed after frame {}",
                idx.0, last.0
            )));
        }

        let size = frame.size();
        if size.width != cfg.width || size.height != cfg.height {
            return Err(MontageError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                size.width, size.height, cfg.width, cfg.height
            )));
        }

        flatten_over_background(&mut self.scratch, frame, self.opts.bg_rgba);
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| MontageError::render("ffmpeg sink is already finalized"))?;
        encoder.write_frame(&self.scratch)?;
        self.last_idx = Some(idx);
        Ok(())
    }

    fn end(&mut self) -> MontageResult<()> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| MontageError::render("ffmpeg sink not started"))?;
        encoder.finish()?;
        // Keep cfg through a failed finish so a follow-up abort still removes
        // the broken artifact.
        self.cfg = None;
        Ok(())
    }

    fn abort(&mut self) -> MontageResult<()> {
        if let Some(encoder) = self.encoder.take() {
            encoder.kill();
        }
        let started = self.cfg.take().is_some();
        if started && self.opts.out_path.exists() {
            std::fs::remove_file(&self.opts.out_path).map_err(|e| {
                MontageError::render(format!(
                    "failed to remove partial output '{}': {e}",
                    self.opts.out_path.display()
                ))
            })?;
            debug!(out = %self.opts.out_path.display(), "removed partial output after abort");
        }
        Ok(())
    }
}

/// A running ffmpeg child: its stdin for raw frames and a thread draining stderr
/// so the child can never block on a full pipe.
struct Encoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<Vec<u8>>>,
}

impl Encoder {
    fn spawn(args: &[OsString]) -> MontageResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MontageError::render(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MontageError::render("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MontageError::render("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = stderr.read_to_end(&mut bytes);
            bytes
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
        })
    }

    fn write_frame(&mut self, rgba: &[u8]) -> MontageResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MontageError::render("ffmpeg stdin already closed"))?;
        stdin.write_all(rgba).map_err(|e| {
            MontageError::render(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }

    /// Close stdin, wait for the child, and surface its stderr on failure.
    fn finish(mut self) -> MontageResult<()> {
        drop(self.stdin.take());
        let status = self.child.wait().map_err(|e| {
            MontageError::render(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = self.drain_stderr();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(MontageError::render(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Tear the child down without finalizing the artifact. Stdin is dropped first
    /// so ffmpeg stops waiting for frames before the kill lands.
    fn kill(mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = self.drain_stderr();
    }

    fn drain_stderr(&mut self) -> Vec<u8> {
        match self.stderr_drain.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

fn encode_args(cfg: &SinkConfig, opts: &FfmpegSinkOpts) -> Vec<OsString> {
    // Raw opaque RGBA8 frames on stdin, at the configured rate.
    let mut args: Vec<OsString> = vec![
        if opts.overwrite { "-y" } else { "-n" }.into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", cfg.width, cfg.height).into(),
        "-r".into(),
        format!("{}/{}", cfg.fps.num, cfg.fps.den).into(),
        "-i".into(),
        "pipe:0".into(),
    ];

    // h264 + yuv420p for broad player compatibility.
    if let Some(audio) = cfg.audio.as_ref() {
        args.extend([
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            audio.sample_rate.to_string().into(),
            "-ac".into(),
            audio.channels.to_string().into(),
            "-i".into(),
            audio.path.clone().into_os_string(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
        ]);
    } else {
        args.extend([
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);
    }

    args.extend(["-movflags".into(), "+faststart".into()]);
    args.push(opts.out_path.clone().into_os_string());
    args
}

/// Flatten a premultiplied frame over `bg_rgba` into opaque RGBA8. `dst` must hold
/// exactly one output frame; [`PixelFrame`] guarantees its buffer is width*height*4.
fn flatten_over_background(dst: &mut [u8], frame: &PixelFrame, bg_rgba: [u8; 4]) {
    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];
    for (d, s) in dst.chunks_exact_mut(4).zip(frame.data().chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255u16 - a;
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::AudioInputConfig;
    use crate::foundation::core::{Fps, PixelSize};

    fn one_px(size: PixelSize, premul: [u8; 4]) -> PixelFrame {
        PixelFrame::from_premul_rgba8(size, premul.to_vec()).unwrap()
    }

    fn video_cfg() -> SinkConfig {
        SinkConfig {
            width: 720,
            height: 720,
            fps: Fps::new(30, 1).unwrap(),
            audio: None,
        }
    }

    #[test]
    fn audio_input_toggles_mux_arguments() {
        let opts = FfmpegSinkOpts::new("/tmp/out.mp4");

        let silent = encode_args(&video_cfg(), &opts);
        assert!(silent.contains(&OsString::from("-an")));
        assert!(!silent.contains(&OsString::from("aac")));
        assert_eq!(silent.last(), Some(&OsString::from("/tmp/out.mp4")));

        let mut cfg = video_cfg();
        cfg.audio = Some(AudioInputConfig {
            path: "/tmp/mix.f32le".into(),
            sample_rate: 44_100,
            channels: 2,
        });
        let with_audio = encode_args(&cfg, &opts);
        assert!(!with_audio.contains(&OsString::from("-an")));
        assert!(with_audio.contains(&OsString::from("aac")));
        assert!(with_audio.contains(&OsString::from("-shortest")));
        assert!(with_audio.contains(&OsString::from("/tmp/mix.f32le")));
    }

    #[test]
    fn transparent_frame_flattens_to_background() {
        let size = PixelSize::new(1, 1).unwrap();
        let frame = one_px(size, [0, 0, 0, 0]);
        let mut dst = vec![0u8; 4];
        flatten_over_background(&mut dst, &frame, [10, 20, 30, 255]);
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn opaque_frame_is_copied_unchanged() {
        let size = PixelSize::new(1, 1).unwrap();
        let frame = one_px(size, [1, 2, 3, 255]);
        let mut dst = vec![0u8; 4];
        flatten_over_background(&mut dst, &frame, [10, 20, 30, 255]);
        assert_eq!(dst, vec![1, 2, 3, 255]);
    }

    #[test]
    fn half_transparent_frame_blends_with_background() {
        let size = PixelSize::new(1, 1).unwrap();
        let frame = one_px(size, [100, 0, 0, 128]);
        let mut dst = vec![0u8; 4];
        flatten_over_background(&mut dst, &frame, [0, 0, 200, 255]);
        // Premul source contributes as-is; background is scaled by 255 - 128.
        assert_eq!(dst, vec![100, 0, 100, 255]);
    }

    #[test]
    fn push_before_begin_is_rejected() {
        let size = PixelSize::new(2, 2).unwrap();
        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("/tmp/montage_never_written.mp4"));
        let err = sink.push_frame(FrameIndex(0), &PixelFrame::solid(size, [0, 0, 0, 255]));
        assert!(err.is_err());
    }

    #[test]
    fn abort_before_begin_leaves_existing_files_alone() {
        let path = std::env::temp_dir().join(format!(
            "montage_abort_keep_{}.mp4",
            std::process::id()
        ));
        std::fs::write(&path, b"not ours to delete").unwrap();

        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&path));
        sink.abort().unwrap();
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
    }
}
