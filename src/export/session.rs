use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::compose::{ComposeRequest, RenderProfile, compose_frame};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::export::audio::{decode_tracks, mix_tracks, write_mix_to_f32le_file};
use crate::export::timeline::build_timeline;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::MontageError;
use crate::media::ffmpeg::MIX_SAMPLE_RATE;
use crate::media::store::SourceStore;
use crate::model::composition::Composition;
use crate::model::settings::{AppDefaults, ExportSettings};

/// Cooperative cancellation flag shared between the control thread and the export
/// worker. Checked between frames; the in-flight composite always completes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Lifecycle of one export run. Terminal states require a fresh session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Building,
    Rendering,
    Completed,
    Failed,
    Cancelled,
}

impl ExportState {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// How an export run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The artifact is complete. Carries the output path for file-backed sinks.
    Completed(Option<PathBuf>),
    /// The run failed; the reason is surfaced and any partial output was removed.
    Failed(String),
    /// The user cancelled; any partial output was removed.
    Cancelled,
}

/// Progress observer invoked from the export thread at a bounded interval.
pub type ProgressCallback = Box<dyn FnMut(f64) + Send>;

const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// One export run, configured and then consumed by [`ExportSession::start`].
///
/// The session takes a composition snapshot at construction, so the control thread
/// can keep editing while the export renders. Consuming the session on start is what
/// enforces single-export exclusivity: the returned [`ExportHandle`] is the only way
/// to observe or join the run.
pub struct ExportSession {
    composition: Composition,
    store: SourceStore,
    settings: ExportSettings,
    defaults: AppDefaults,
    sink: Box<dyn FrameSink>,
    artifact_path: Option<PathBuf>,
    progress_callback: Option<ProgressCallback>,
    progress_interval: Duration,
}

impl ExportSession {
    /// Snapshot `composition` and prepare a session rendering into `sink`.
    pub fn new(
        composition: &Composition,
        store: SourceStore,
        settings: ExportSettings,
        defaults: AppDefaults,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            composition: composition.snapshot(),
            store,
            settings,
            defaults,
            sink,
            artifact_path: None,
            progress_callback: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Path reported back through [`ExportOutcome::Completed`] for file-backed sinks.
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    /// Observe progress fractions; invoked at most once per `interval`, plus once at
    /// the final frame.
    pub fn with_progress_callback(mut self, cb: ProgressCallback, interval: Duration) -> Self {
        self.progress_callback = Some(cb);
        self.progress_interval = interval;
        self
    }

    /// Spawn the export thread and hand back its handle.
    pub fn start(self) -> ExportHandle {
        let token = CancelToken::new();
        let shared = Arc::new(Shared {
            state: Mutex::new(ExportState::Idle),
            progress_ppm: AtomicU64::new(0),
        });

        let worker_token = token.clone();
        let worker_shared = shared.clone();
        let join = std::thread::spawn(move || self.run(worker_token, worker_shared));

        ExportHandle {
            token,
            shared,
            join: Some(join),
        }
    }

    fn run(mut self, token: CancelToken, shared: Arc<Shared>) -> ExportOutcome {
        shared.set_state(ExportState::Building);
        info!("export: building timeline");

        let timeline = match build_timeline(&self.composition, self.store.library(), &self.defaults)
        {
            Ok(t) => t,
            Err(e) => return shared.fail(format!("composition build failed: {e}")),
        };

        let mut audio_tmp = TempFileGuard(None);
        let audio_cfg = if timeline.audio_tracks.is_empty() {
            None
        } else {
            match self.prepare_audio(&timeline, &mut audio_tmp) {
                Ok(cfg) => Some(cfg),
                Err(e) => return shared.fail(format!("audio mix failed: {e}")),
            }
        };

        let canvas = self.settings.pixel_size(self.composition.aspect);
        let cfg = SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.settings.fps,
            audio: audio_cfg,
        };
        if let Err(e) = self.sink.begin(cfg) {
            return shared.fail(format!("sink start failed: {e}"));
        }

        shared.set_state(ExportState::Rendering);
        let total_frames = self.settings.fps.secs_to_frames_ceil(timeline.total_secs).max(1);
        info!(frames = total_frames, secs = timeline.total_secs, "export: rendering");

        let mut last_report: Option<Instant> = None;
        for idx in 0..total_frames {
            if token.is_cancelled() {
                return self.cancelled(&shared);
            }

            let t = self.settings.fps.frames_to_secs(idx);
            let req = ComposeRequest {
                composition: &self.composition,
                canvas,
                time_secs: t,
                profile: RenderProfile::export(),
            };
            let frame = match compose_frame(&req, &mut self.store) {
                Ok(frame) => frame,
                Err(MontageError::Cancelled) => return self.cancelled(&shared),
                Err(e) => {
                    let _ = self.sink.abort();
                    return shared.fail(format!("frame {idx} failed: {e}"));
                }
            };
            if let Err(e) = self.sink.push_frame(FrameIndex(idx), &frame) {
                let _ = self.sink.abort();
                return shared.fail(format!("sink rejected frame {idx}: {e}"));
            }

            let fraction = (idx + 1) as f64 / total_frames as f64;
            shared.bump_progress(fraction);
            if let Some(cb) = self.progress_callback.as_mut() {
                let due = last_report
                    .is_none_or(|at| at.elapsed() >= self.progress_interval);
                if due || idx + 1 == total_frames {
                    cb(fraction);
                    last_report = Some(Instant::now());
                }
            }
        }

        if let Err(e) = self.sink.end() {
            let _ = self.sink.abort();
            return shared.fail(format!("sink finalize failed: {e}"));
        }

        shared.set_state(ExportState::Completed);
        info!("export: completed");
        ExportOutcome::Completed(self.artifact_path)
    }

    fn cancelled(&mut self, shared: &Shared) -> ExportOutcome {
        if let Err(e) = self.sink.abort() {
            warn!(error = %e, "sink abort after cancellation failed");
        }
        shared.set_state(ExportState::Cancelled);
        info!("export: cancelled");
        ExportOutcome::Cancelled
    }

    fn prepare_audio(
        &self,
        timeline: &crate::export::timeline::ExportTimeline,
        guard: &mut TempFileGuard,
    ) -> crate::foundation::error::MontageResult<AudioInputConfig> {
        let decoded = decode_tracks(&timeline.audio_tracks)?;
        let mixed = mix_tracks(&decoded, timeline.total_secs);
        let path = std::env::temp_dir().join(format!(
            "montage_audio_mix_{}_{}.f32le",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        write_mix_to_f32le_file(&mixed, &path)?;
        guard.0 = Some(path.clone());
        Ok(AudioInputConfig {
            path,
            sample_rate: MIX_SAMPLE_RATE,
            channels: 2,
        })
    }
}

struct Shared {
    state: Mutex<ExportState>,
    progress_ppm: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: ExportState) {
        if let Ok(mut s) = self.state.lock() {
            *s = state;
        }
    }

    fn fail(&self, reason: String) -> ExportOutcome {
        warn!(reason = %reason, "export failed");
        self.set_state(ExportState::Failed);
        ExportOutcome::Failed(reason)
    }

    fn bump_progress(&self, fraction: f64) {
        let ppm = (fraction.clamp(0.0, 1.0) * 1_000_000.0) as u64;
        self.progress_ppm.fetch_max(ppm, Ordering::Relaxed);
    }
}

/// Owned view of a running export.
///
/// Dropping the handle detaches the run (it finishes on its own); `wait` joins it.
pub struct ExportHandle {
    token: CancelToken,
    shared: Arc<Shared>,
    join: Option<JoinHandle<ExportOutcome>>,
}

impl ExportHandle {
    /// Monotone progress fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.shared.progress_ppm.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExportState {
        self.shared
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(ExportState::Failed)
    }

    /// Request cancellation. The worker stops between frames and removes partial
    /// output; observe the result through [`ExportHandle::wait`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Block until the export finishes and return how it ended.
    pub fn wait(mut self) -> ExportOutcome {
        match self.join.take() {
            Some(join) => join
                .join()
                .unwrap_or_else(|_| ExportOutcome::Failed("export thread panicked".into())),
            None => ExportOutcome::Failed("export already joined".into()),
        }
    }
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
