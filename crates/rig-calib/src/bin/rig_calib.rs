use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum};
use rig_calib::{
    default_synthetic_rig, Broadcaster, CalibrationService, ChannelSink, DotOrdering, FrameSource,
    JsonCalibrationStore, Resolution, RigConfig, SyntheticFrameSource, SyntheticTarget,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Multi-camera rig calibration from bright fiducial dots")]
struct Cli {
    /// Log level: error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate a synthetic three-camera rig and print the outcome as JSON.
    Calibrate(CalibrateArgs),
    /// Detect dots in an image file and print their centroids as JSON.
    Detect {
        #[arg(long)]
        image: PathBuf,
        /// Rig config providing the detector parameters.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default rig config to a file.
    InitConfig { path: PathBuf },
}

#[derive(Debug, clap::Args)]
struct CalibrateArgs {
    /// Rig config JSON. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = TargetArg::Cube)]
    target: TargetArg,

    #[arg(long, value_enum, default_value_t = ResolutionArg::Large)]
    resolution: ResolutionArg,

    /// Pair dots in row-major order, starting a new row after this many pixels.
    #[arg(long)]
    row_tolerance: Option<f32>,

    /// Calibration file, overrides the config's `store_path`.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Radius in pixels of the rendered synthetic dots.
    #[arg(long, default_value_t = 6.0)]
    dot_radius: f32,

    /// Number of position broadcasts to print after calibrating.
    #[arg(long, default_value_t = 0)]
    ticks: usize,

    /// Save each synthetic camera frame as `camera_<i>.png` in this directory.
    #[arg(long)]
    dump_frames: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TargetArg {
    Cube,
    Plane,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResolutionArg {
    Large,
    Small,
}

impl From<TargetArg> for SyntheticTarget {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Cube => SyntheticTarget::Cube,
            TargetArg::Plane => SyntheticTarget::Plane,
        }
    }
}

impl From<ResolutionArg> for Resolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::Large => Resolution::Large,
            ResolutionArg::Small => Resolution::Small,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RigConfig, Box<dyn Error>> {
    Ok(match path {
        Some(p) => RigConfig::load_json(p)?,
        None => RigConfig::default(),
    })
}

fn run_calibrate(args: CalibrateArgs) -> Result<bool, Box<dyn Error>> {
    let mut config = load_config(args.config.as_deref())?;
    let resolution = Resolution::from(args.resolution);
    let (width, height) = resolution.dimensions();
    config.resolution = [width, height];
    if let Some(row_tolerance) = args.row_tolerance {
        config.ordering = DotOrdering::RowMajor { row_tolerance };
    }
    if let Some(store) = args.store {
        config.store_path = store;
    }

    let source = Arc::new(
        SyntheticFrameSource::from_target(resolution, args.target.into(), &default_synthetic_rig())
            .with_dot_radius(args.dot_radius),
    );
    if let Some(dir) = args.dump_frames.as_deref() {
        dump_frames(source.as_ref(), dir)?;
    }

    let store = Arc::new(JsonCalibrationStore::new(&config.store_path));
    let interval = config.broadcast_interval();
    let service = CalibrationService::startup(config, source, store)?;
    service.start_stream();
    let outcome = service.trigger();
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if args.ticks > 0 {
        let (tx, rx) = mpsc::channel();
        let handle = Broadcaster::spawn(service.rig(), ChannelSink(tx), interval);
        for _ in 0..args.ticks {
            let update = rx.recv_timeout(interval + Duration::from_secs(5))?;
            println!("{}", serde_json::to_string(&update)?);
        }
        handle.shutdown();
    }
    service.stop_stream();
    Ok(outcome.success)
}

#[cfg(feature = "image")]
fn dump_frames(source: &SyntheticFrameSource, dir: &Path) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(dir)?;
    for i in 0..source.camera_count() {
        let frame = source.read(i)?;
        rig_calib::detect::save_rgb(&frame.image, dir.join(format!("camera_{i}.png")))?;
    }
    Ok(())
}

#[cfg(not(feature = "image"))]
fn dump_frames(_source: &SyntheticFrameSource, _dir: &Path) -> Result<(), Box<dyn Error>> {
    Err("frame dumps need the `image` feature".into())
}

#[cfg(feature = "image")]
fn run_detect(image: &Path, config: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = load_config(config)?;
    let frame = rig_calib::detect::load_rgb(image)?;
    let dots = rig_calib::DotDetector::new(config.detector).detect_rgb(&frame);
    let xy: Vec<[f32; 2]> = dots.iter().map(|d| [d.x, d.y]).collect();
    println!("{}", serde_json::to_string_pretty(&xy)?);
    Ok(())
}

#[cfg(not(feature = "image"))]
fn run_detect(_image: &Path, _config: Option<&Path>) -> Result<(), Box<dyn Error>> {
    Err("image decoding needs the `image` feature".into())
}

fn main() {
    match try_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn try_main() -> Result<bool, Box<dyn Error>> {
    let cli = Cli::parse();

    #[cfg(feature = "tracing")]
    rig_calib::core::init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    rig_calib::core::init_from_str(&cli.log_level)?;

    match cli.command {
        Command::Calibrate(args) => run_calibrate(args),
        Command::Detect { image, config } => {
            run_detect(&image, config.as_deref())?;
            Ok(true)
        }
        Command::InitConfig { path } => {
            RigConfig::default().write_json(&path)?;
            Ok(true)
        }
    }
}
