//! `headtrack`: replay recorded frames through the head-frame tracker and
//! write a JSON report.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use headtrack::core::Homography;
use headtrack::{
    Correspondence, CorrespondenceStrategy, FrameSource, FrameSourceError, HeadTracker,
    ImageSequenceSource, Marker, MarkerStatus, OutputMode, TrackerParams, TransformStatus,
};
use log::LevelFilter;
use serde::Serialize;

#[cfg(not(feature = "tracing"))]
use log::{info, warn};
#[cfg(feature = "tracing")]
use tracing::{info, warn};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff"];

#[derive(Parser, Debug)]
#[command(name = "headtrack")]
#[command(about = "Track four head-frame markers across recorded frames")]
#[command(version)]
struct Cli {
    /// Frame images or directories of frames (directories are read in file name order).
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Tracker parameters (JSON); flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Save each cycle's exposed image into this directory.
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Expose the binary mask instead of the annotated frame.
    #[arg(long)]
    binary: bool,

    /// Binarization threshold (luma strictly above is foreground).
    #[arg(long)]
    threshold: Option<u8>,

    /// Number of 3x3 dilation passes.
    #[arg(long)]
    dilate: Option<usize>,

    /// Use the one-to-one minimum-distance assignment instead of nearest-per-corner.
    #[arg(long)]
    bijective: bool,

    /// Also save frames rectified into the reference rectangle (needs --save-dir).
    #[arg(long, requires = "save_dir")]
    warp: bool,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no image files found")]
    NoFrames,
    #[error(transparent)]
    Source(#[from] FrameSourceError),
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(not(feature = "tracing"))]
    #[error("failed to install logger: {0}")]
    Logger(String),
}

#[derive(Debug, Serialize)]
struct RunReport {
    params: TrackerParams,
    width: u32,
    height: u32,
    frames: Vec<FrameReport>,
}

#[derive(Debug, Serialize)]
struct FrameReport {
    index: usize,
    path: PathBuf,
    marker_status: MarkerStatus,
    markers: [Marker; 4],
    correspondence: Correspondence,
    homography: Homography,
    transform_status: TransformStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warp_path: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let level = LevelFilter::from_str(&cli.log_level).unwrap_or(LevelFilter::Info);
    if let Err(err) = init_logging(level).and_then(|()| run(&cli)) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(level: LevelFilter) -> Result<(), CliError> {
    #[cfg(feature = "tracing")]
    {
        let _ = level;
        headtrack::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    headtrack::core::init_with_level(level).map_err(|e| CliError::Logger(e.to_string()))?;
    Ok(())
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
fn run(cli: &Cli) -> Result<(), CliError> {
    let params = build_params(cli)?;
    let paths = collect_frames(&cli.frames)?;
    info!("{} frames", paths.len());

    if let Some(dir) = &cli.save_dir {
        fs::create_dir_all(dir).map_err(|source| CliError::Io {
            path: dir.clone(),
            source,
        })?;
    }

    let source = ImageSequenceSource::from_paths(&paths)?;
    let (width, height) = (source.width(), source.height());
    let mut tracker = HeadTracker::new(source, params.clone());

    let mut frames = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        headtrack::core::set_log_frame(Some(index));
        let frame = tracker.source_mut().grab()?;
        let tracked = tracker.process_frame(&frame);
        if !tracked.marker_status.is_fresh() {
            warn!("{}: markers reused", path.display());
        }

        let mut image_path = None;
        let mut warp_path = None;
        if let Some(dir) = &cli.save_dir {
            let out = dir.join(format!("frame_{index:04}.png"));
            tracked.image.save(&out).map_err(|source| CliError::Save {
                path: out.clone(),
                source,
            })?;
            image_path = Some(out);

            if cli.warp {
                match tracker.warp_to_reference(&frame) {
                    Some(warped) => {
                        let out = dir.join(format!("warp_{index:04}.png"));
                        warped.save(&out).map_err(|source| CliError::Save {
                            path: out.clone(),
                            source,
                        })?;
                        warp_path = Some(out);
                    }
                    None => warn!("{}: transform not invertible, no warp", path.display()),
                }
            }
        }

        frames.push(FrameReport {
            index,
            path: path.clone(),
            marker_status: tracked.marker_status,
            markers: tracked.markers,
            correspondence: tracked.correspondence,
            homography: tracked.homography,
            transform_status: tracked.transform_status,
            image_path,
            warp_path,
        });
    }

    headtrack::core::set_log_frame(None);

    let report = RunReport {
        params,
        width,
        height,
        frames,
    };
    write_report(cli.output.as_deref(), &report)
}

fn build_params(cli: &Cli) -> Result<TrackerParams, CliError> {
    let mut params = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| CliError::Config {
                path: path.clone(),
                source,
            })?
        }
        None => TrackerParams::default(),
    };
    if let Some(t) = cli.threshold {
        params.binarize.threshold = t;
    }
    if let Some(n) = cli.dilate {
        params.binarize.dilate_iterations = n;
    }
    if cli.binary {
        params.output = OutputMode::Binary;
    }
    if cli.bijective {
        params.correspondence = CorrespondenceStrategy::Bijective;
    }
    Ok(params)
}

fn collect_frames(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input).map_err(|source| CliError::Io {
                path: input.clone(),
                source,
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            found.sort();
            out.extend(found);
        } else {
            out.push(input.clone());
        }
    }
    if out.is_empty() {
        return Err(CliError::NoFrames);
    }
    Ok(out)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn write_report(path: Option<&Path>, report: &RunReport) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => {
            fs::write(path, json).map_err(|source| CliError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
