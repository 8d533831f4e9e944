use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use montage::{
    AppDefaults, Composition, ExportOutcome, ExportSession, ExportSettings, FfmpegSink,
    FfmpegSinkOpts, Fps, LayerSource, MediaId, MediaItem, ResolutionTier, SourceStore,
    StillImageSource,
};

#[derive(Parser, Debug)]
#[command(name = "montage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a project to MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Probe a media file and print its metadata as JSON.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Output resolution tier.
    #[arg(long, value_enum, default_value_t = TierChoice::High)]
    tier: TierChoice,

    /// Output frames per second.
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Media file to probe.
    path: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TierChoice {
    Standard,
    High,
}

/// On-disk project: a composition plus the files its media ids resolve to.
#[derive(serde::Deserialize)]
struct Project {
    composition: Composition,
    media: Vec<MediaEntry>,
}

#[derive(serde::Deserialize)]
struct MediaEntry {
    id: u64,
    kind: MediaEntryKind,
    path: PathBuf,
}

#[derive(serde::Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum MediaEntryKind {
    Video,
    Image,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn read_project(path: &Path) -> anyhow::Result<Project> {
    let f = File::open(path).with_context(|| format!("open project '{}'", path.display()))?;
    let r = BufReader::new(f);
    let project: Project = serde_json::from_reader(r).with_context(|| "parse project JSON")?;
    Ok(project)
}

fn build_store(entries: &[MediaEntry], project_dir: &Path) -> anyhow::Result<SourceStore> {
    let mut store = SourceStore::new();
    for entry in entries {
        let path = if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            project_dir.join(&entry.path)
        };
        match entry.kind {
            MediaEntryKind::Image => {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("read image '{}'", path.display()))?;
                let source = StillImageSource::from_encoded(&bytes)?;
                let item = MediaItem::image(MediaId(entry.id), source.pixel_size())
                    .with_source_path(&path);
                store.insert(item, Box::new(source))?;
            }
            MediaEntryKind::Video => {
                #[cfg(feature = "media-ffmpeg")]
                {
                    use montage::media::VideoFileSource;
                    let source = VideoFileSource::open(&path)?;
                    let info = source.info().clone();
                    let item = MediaItem::video(
                        MediaId(entry.id),
                        source.pixel_size(),
                        info.duration_secs,
                        info.has_audio,
                    )?
                    .with_source_path(&path);
                    store.insert(item, Box::new(source))?;
                }
                #[cfg(not(feature = "media-ffmpeg"))]
                {
                    anyhow::bail!(
                        "video media '{}' requires the 'media-ffmpeg' feature",
                        path.display()
                    );
                }
            }
        }
    }
    Ok(store)
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let project = read_project(&args.in_path)?;
    let project_dir = args.in_path.parent().unwrap_or_else(|| Path::new("."));
    let store = build_store(&project.media, project_dir)?;
    project.composition.validate(store.library())?;

    let settings = ExportSettings {
        tier: match args.tier {
            TierChoice::Standard => ResolutionTier::Standard,
            TierChoice::High => ResolutionTier::High,
        },
        fps: Fps::new(args.fps, 1)?,
        overwrite: true,
    };

    let sink = FfmpegSink::new(FfmpegSinkOpts::new(&args.out));
    let session = ExportSession::new(
        &project.composition,
        store,
        settings,
        AppDefaults::default(),
        Box::new(sink),
    )
    .with_artifact_path(&args.out)
    .with_progress_callback(
        Box::new(|fraction| {
            eprint!("\rexporting... {:>5.1}%", fraction * 100.0);
        }),
        std::time::Duration::from_millis(100),
    );

    let outcome = session.start().wait();
    eprintln!();
    match outcome {
        ExportOutcome::Completed(path) => {
            if let Some(path) = path {
                println!("{}", path.display());
            }
            Ok(())
        }
        ExportOutcome::Failed(reason) => anyhow::bail!("export failed: {reason}"),
        ExportOutcome::Cancelled => anyhow::bail!("export cancelled"),
    }
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = montage::media::ffmpeg::probe_video(&args.path)?;
    let out = serde_json::json!({
        "path": info.source_path,
        "width": info.width,
        "height": info.height,
        "fps": format!("{}/{}", info.fps_num, info.fps_den),
        "duration_secs": info.duration_secs,
        "has_audio": info.has_audio,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
